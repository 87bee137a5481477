use bytes::Bytes;
use log::{debug, warn};

use crate::errors::{ErrorCode, ErrorStack, Result};
use crate::keyring::Keyring;
use crate::packet::{OnePassSignature, Packet, PacketTrait, Signature, SignatureType};
use crate::validate::{drive, Flow, PacketHandler, ValidationOptions, ValidationResult};

/// Validates signatures over document data.
///
/// The data comes either from a literal data packet in the stream, or is
/// given up front for detached signatures. Signatures arriving before the
/// literal data are held until it shows up.
#[derive(Debug)]
pub struct DataValidator<'a> {
    keyring: &'a Keyring,
    options: &'a ValidationOptions,
    data: Option<Bytes>,
    one_pass: Vec<OnePassSignature>,
    pending: Vec<Signature>,
    result: ValidationResult,
    errors: ErrorStack,
}

impl<'a> DataValidator<'a> {
    pub fn new(keyring: &'a Keyring, options: &'a ValidationOptions) -> Self {
        DataValidator {
            keyring,
            options,
            data: None,
            one_pass: Vec::new(),
            pending: Vec::new(),
            result: ValidationResult::default(),
            errors: ErrorStack::new(),
        }
    }

    /// A validator for signatures detached from `data`.
    pub fn detached(data: impl Into<Bytes>, keyring: &'a Keyring, options: &'a ValidationOptions) -> Self {
        let mut validator = Self::new(keyring, options);
        validator.data = Some(data.into());
        validator
    }

    pub fn result(&self) -> &ValidationResult {
        &self.result
    }

    /// Classifies signatures still waiting for data as invalid.
    pub fn finish(mut self) -> (ValidationResult, ErrorStack) {
        for sig in std::mem::take(&mut self.pending) {
            push_error!(self.errors, ErrorCode::UnexpectedSignature, "signature without signed data");
            self.result.add_invalid(sig.info());
        }
        if !self.one_pass.is_empty() {
            push_error!(
                self.errors,
                ErrorCode::Stream,
                "{} one pass signatures without a signature",
                self.one_pass.len()
            );
        }

        (self.result, self.errors)
    }

    fn check_signature(&mut self, sig: &Signature, data: &[u8]) {
        let info = sig.info();
        let Some(issuer) = sig.issuer() else {
            self.result.add_unknown(info);
            return;
        };
        let Some((_, signer)) = self.keyring.find_signer(issuer) else {
            debug!("signer {} not in keyring", issuer);
            self.result.add_unknown(info);
            return;
        };
        if self.options.debug().is_enabled("validate") {
            debug!("{:?} data signature by {} over {} bytes", sig.typ(), issuer, data.len());
        }

        if !matches!(sig.typ(), SignatureType::Binary | SignatureType::Text) {
            push_error!(
                self.errors,
                ErrorCode::UnexpectedSignature,
                "{:?} signature over data",
                sig.typ()
            );
            self.result.add_invalid(info);
            return;
        }

        match sig.verify_data(&signer, data) {
            Ok(()) => self.result.add_valid(info),
            Err(err) => {
                warn!("data signature by {} is invalid: {}", issuer, err);
                self.result.add_invalid(info);
            }
        }
    }

    fn on_signature(&mut self, sig: Signature) {
        // one pass signatures nest, the innermost is closed first
        if let Some(ops) = self.one_pass.pop() {
            if sig.issuer() != Some(&ops.key_id) || sig.typ() != ops.typ {
                push_error!(
                    self.errors,
                    ErrorCode::UnexpectedSignature,
                    "signature does not match its one pass header {}",
                    ops.key_id
                );
            }
        }

        match self.data.clone() {
            Some(data) => self.check_signature(&sig, &data),
            None => self.pending.push(sig),
        }
    }

    fn on_data(&mut self, data: Bytes) -> Flow {
        if self.data.is_some() {
            push_error!(self.errors, ErrorCode::Stream, "more than one literal data packet");
            return Flow::Finished;
        }
        for sig in std::mem::take(&mut self.pending) {
            self.check_signature(&sig, &data);
        }
        self.data = Some(data);
        Flow::Continue
    }
}

impl PacketHandler for DataValidator<'_> {
    fn handle(&mut self, packet: Result<Packet>) -> Flow {
        let packet = match packet {
            Ok(packet) => packet,
            Err(err) => {
                push_error!(self.errors, ErrorCode::Stream, "data pass aborted: {}", err);
                return Flow::Finished;
            }
        };

        match packet {
            Packet::OnePassSignature(ops) => {
                self.one_pass.push(ops);
                Flow::Continue
            }
            Packet::LiteralData(lit) => self.on_data(Bytes::copy_from_slice(lit.data())),
            Packet::Signature(sig) => {
                self.on_signature(sig);
                Flow::Continue
            }
            other => {
                debug!("ignoring {:?} in data pass", other.tag());
                Flow::Continue
            }
        }
    }
}

/// Validates a signed message: one pass signatures, literal data and
/// signatures, in either order.
pub fn validate_data<I>(
    packets: I,
    keyring: &Keyring,
    options: &ValidationOptions,
    errors: &mut ErrorStack,
) -> ValidationResult
where
    I: IntoIterator<Item = Result<Packet>>,
{
    let mut validator = DataValidator::new(keyring, options);
    drive(&mut validator, packets);
    let (result, mut pass_errors) = validator.finish();
    errors.append(&mut pass_errors);

    result
}

/// Validates detached signatures over `data`.
pub fn validate_detached<I>(
    data: &[u8],
    signatures: I,
    keyring: &Keyring,
    options: &ValidationOptions,
    errors: &mut ErrorStack,
) -> ValidationResult
where
    I: IntoIterator<Item = Result<Packet>>,
{
    let mut validator = DataValidator::detached(Bytes::copy_from_slice(data), keyring, options);
    drive(&mut validator, signatures);
    let (result, mut pass_errors) = validator.finish();
    errors.append(&mut pass_errors);

    result
}
