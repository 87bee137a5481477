use chrono::{DateTime, Duration, Utc};

use crate::packet::SignatureInfo;

/// Signatures sorted by outcome, and the validity window they imply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: Vec<SignatureInfo>,
    pub invalid: Vec<SignatureInfo>,
    /// Signatures whose signer is not in the keyring, or that name no signer.
    pub unknown: Vec<SignatureInfo>,
    /// Earliest creation time of a checked signature.
    pub birthtime: Option<DateTime<Utc>>,
    /// Smallest non-zero expiration of a checked signature, in seconds.
    pub duration: Option<u32>,
}

impl ValidationResult {
    pub fn validc(&self) -> usize {
        self.valid.len()
    }

    pub fn invalidc(&self) -> usize {
        self.invalid.len()
    }

    pub fn unknownc(&self) -> usize {
        self.unknown.len()
    }

    /// No signature was seen at all.
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty() && self.invalid.is_empty() && self.unknown.is_empty()
    }

    fn record_window(&mut self, info: &SignatureInfo) {
        if let Some(created) = info.created {
            self.birthtime = Some(match self.birthtime {
                Some(b) if b <= created => b,
                _ => created,
            });
        }
        if let Some(d) = info.duration.filter(|d| *d > 0) {
            self.duration = Some(self.duration.map_or(d, |cur| cur.min(d)));
        }
    }

    pub fn add_valid(&mut self, info: SignatureInfo) {
        self.record_window(&info);
        self.valid.push(info);
    }

    pub fn add_invalid(&mut self, info: SignatureInfo) {
        self.record_window(&info);
        self.invalid.push(info);
    }

    pub fn add_unknown(&mut self, info: SignatureInfo) {
        self.unknown.push(info);
    }

    /// Folds the outcome of another pass into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        let ValidationResult {
            valid,
            invalid,
            unknown,
            birthtime,
            duration,
        } = other;

        for info in valid {
            self.add_valid(info);
        }
        for info in invalid {
            self.add_invalid(info);
        }
        self.unknown.extend(unknown);

        if let Some(b) = birthtime {
            if self.birthtime.map_or(true, |cur| b < cur) {
                self.birthtime = Some(b);
            }
        }
        if let Some(d) = duration {
            self.duration = Some(self.duration.map_or(d, |cur| cur.min(d)));
        }
    }

    /// The end of the validity window, when both ends are known.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match (self.birthtime, self.duration) {
            (Some(b), Some(d)) => Some(b + Duration::seconds(i64::from(d))),
            _ => None,
        }
    }

    /// At least one valid signature, no invalid or unknown ones, and `now`
    /// inside the validity window if one was recorded.
    pub fn is_accepted(&self, now: &DateTime<Utc>) -> bool {
        if self.valid.is_empty() || !self.invalid.is_empty() || !self.unknown.is_empty() {
            return false;
        }

        match (self.birthtime, self.expires_at()) {
            (Some(born), Some(expires)) => born <= *now && *now <= expires,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;
    use crate::crypto::public_key::PublicKeyAlgorithm;
    use crate::packet::{SignatureType, SignatureVersion};

    fn info(created: i64, duration: Option<u32>) -> SignatureInfo {
        SignatureInfo {
            version: SignatureVersion::V4,
            typ: SignatureType::CertPositive,
            pub_alg: PublicKeyAlgorithm::RSA,
            hash_alg: HashAlgorithm::Sha1,
            hashed_len: 0,
            created: Some(Utc.timestamp_opt(created, 0).unwrap()),
            duration,
            issuer: None,
        }
    }

    #[test]
    fn test_window() {
        let mut res = ValidationResult::default();
        res.add_valid(info(2000, Some(500)));
        res.add_valid(info(1000, None));
        res.add_valid(info(3000, Some(0)));

        assert_eq!(res.validc(), 3);
        assert_eq!(res.birthtime, Some(Utc.timestamp_opt(1000, 0).unwrap()));
        assert_eq!(res.duration, Some(500));
        assert_eq!(res.expires_at(), Some(Utc.timestamp_opt(1500, 0).unwrap()));

        assert!(res.is_accepted(&Utc.timestamp_opt(1200, 0).unwrap()));
        assert!(res.is_accepted(&Utc.timestamp_opt(1500, 0).unwrap()));
        assert!(!res.is_accepted(&Utc.timestamp_opt(1501, 0).unwrap()));
        assert!(!res.is_accepted(&Utc.timestamp_opt(999, 0).unwrap()));
    }

    #[test]
    fn test_acceptance() {
        let now = Utc.timestamp_opt(5000, 0).unwrap();
        let mut res = ValidationResult::default();
        assert!(res.is_empty());
        assert!(!res.is_accepted(&now));

        res.add_valid(info(1000, None));
        assert!(res.is_accepted(&now));

        let mut unknown = ValidationResult::default();
        unknown.add_unknown(info(1000, None));
        res.merge(unknown);
        assert_eq!(res.unknownc(), 1);
        assert!(!res.is_accepted(&now));

        let mut other = ValidationResult::default();
        other.add_valid(info(4000, None));
        other.add_invalid(info(800, Some(100)));
        let mut only = ValidationResult::default();
        only.merge(other);
        assert_eq!((only.validc(), only.invalidc()), (1, 1));
        assert_eq!(only.birthtime, Some(Utc.timestamp_opt(800, 0).unwrap()));
        assert!(!only.is_accepted(&now));
    }
}
