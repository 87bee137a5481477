use dsa::{Components, Signature, SigningKey, VerifyingKey};
use log::debug;
use signature::hazmat::PrehashVerifier;
use zeroize::Zeroize;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::Result;
use crate::types::{DsaPublicParams, Mpi, SecretMpi};

/// Secret key for DSA.
#[derive(Clone, PartialEq, Eq, Zeroize, derive_more::Debug)]
pub struct SecretKey {
    /// Secret exponent x.
    #[debug("..")]
    pub x: SecretMpi,
}

fn verifying_key(params: &DsaPublicParams) -> Result<VerifyingKey> {
    let components = Components::from_components(
        params.p.to_biguint(),
        params.q.to_biguint(),
        params.g.to_biguint(),
    )?;
    let key = VerifyingKey::from_components(components, params.y.to_biguint())?;
    Ok(key)
}

/// The leftmost bytes of `digest`, at most as many as `q` has.
fn truncate<'a>(params: &DsaPublicParams, digest: &'a [u8]) -> &'a [u8] {
    &digest[..digest.len().min(params.q.len())]
}

impl SecretKey {
    /// Signs the digest, truncated to the byte length of the group order, with
    /// a deterministic nonce.
    pub fn sign(
        &self,
        params: &DsaPublicParams,
        hash: HashAlgorithm,
        digest: &[u8],
    ) -> Result<(Mpi, Mpi)> {
        let key = SigningKey::from_components(verifying_key(params)?, self.x.to_biguint())?;
        let digest = truncate(params, digest);

        let signature = match hash {
            HashAlgorithm::Md5 => key.sign_prehashed_rfc6979::<md5::Md5>(digest),
            HashAlgorithm::Sha1 => key.sign_prehashed_rfc6979::<sha1::Sha1>(digest),
            HashAlgorithm::Sha224 => key.sign_prehashed_rfc6979::<sha2::Sha224>(digest),
            HashAlgorithm::Sha256 => key.sign_prehashed_rfc6979::<sha2::Sha256>(digest),
            HashAlgorithm::Sha384 => key.sign_prehashed_rfc6979::<sha2::Sha384>(digest),
            HashAlgorithm::Sha512 => key.sign_prehashed_rfc6979::<sha2::Sha512>(digest),
            _ => unimplemented_err!("hasher {:?}", hash),
        }?;

        Ok((signature.r().into(), signature.s().into()))
    }
}

/// Verify a DSA signature.
pub fn verify(params: &DsaPublicParams, digest: &[u8], r: &Mpi, s: &Mpi) -> bool {
    let check = || -> Result<()> {
        let key = verifying_key(params)?;
        let signature = Signature::from_components(r.to_biguint(), s.to_biguint())?;
        key.verify_prehash(truncate(params, digest), &signature)?;
        Ok(())
    };

    match check() {
        Ok(()) => true,
        Err(err) => {
            debug!("dsa verification failed: {}", err);
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use num_bigint::BigUint;
    use num_traits::Num;

    use super::*;

    fn hex_num(s: &str) -> BigUint {
        BigUint::from_str_radix(s, 16).expect("invalid hex")
    }

    /// DSA 1024 bit key from <https://tools.ietf.org/html/rfc6979#appendix-A.2.1>
    pub(crate) fn test_key() -> (DsaPublicParams, SecretKey) {
        let p = hex_num(
            "86F5CA03DCFEB225063FF830A0C769B9DD9D6153AD91D7CE27F787C43278B447\
             E6533B86B18BED6E8A48B784A14C252C5BE0DBF60B86D6385BD2F12FB763ED88\
             73ABFD3F5BA2E0A8C0A59082EAC056935E529DAF7C610467899C77ADEDFC846C\
             881870B7B19B2B58F9BE0521A17002E3BDD6B86685EE90B3D9A1B02B782B1779",
        );
        let q = hex_num("996F967F6C8E388D9E28D01E205FBA957A5698B1");
        let g = hex_num(
            "07B0F92546150B62514BB771E2A0C0CE387F03BDA6C56B505209FF25FD3C133D\
             89BBCD97E904E09114D9A7DEFDEADFC9078EA544D2E401AEECC40BB9FBBF78FD\
             87995A10A1C27CB7789B594BA7EFB5C4326A9FE59A070E136DB77175464ADCA4\
             17BE5DCE2F40D10A46A3A3943F26AB7FD9C0398FF8C76EE0A56826A8A88F1DBD",
        );
        let x = hex_num("411602CB19A6CCC34494D79D98EF1E7ED5AF25F7");
        let y = hex_num(
            "5DF5E01DED31D0297E274E1691C192FE5868FEF9E19A84776454B100CF16F653\
             92195A38B90523E2542EE61871C0440CB87C322FC4B4D2EC5E1E7EC766E1BE8D\
             4CE935437DC11C3C8FD426338933EBFE739CB3465F4D3668C5E473508253B1E6\
             82F65CBDC4FAE93C2EA212390E54905A86E2223170B44EAA7DA5DD9FFCFB7F3B",
        );

        (
            DsaPublicParams {
                p: p.into(),
                q: q.into(),
                g: g.into(),
                y: y.into(),
            },
            SecretKey { x: (&x).into() },
        )
    }

    #[test]
    fn test_dsa_1024_vectors() {
        let _ = pretty_env_logger::try_init();
        let (params, key) = test_key();

        let check = |hash: HashAlgorithm, text: &str, r: &str, s: &str| {
            let digest = hash.digest(text.as_bytes()).unwrap();
            let (new_r, new_s) = key.sign(&params, hash, &digest).unwrap();
            assert_eq!(new_r, Mpi::from(hex_num(r)));
            assert_eq!(new_s, Mpi::from(hex_num(s)));
            assert!(verify(&params, &digest, &new_r, &new_s));
        };

        check(
            HashAlgorithm::Sha1,
            "sample",
            "2E1A0C2562B2912CAAF89186FB0F42001585DA55",
            "29EFB6B0AFF2D7A68EB70CA313022253B9A88DF5",
        );
        check(
            HashAlgorithm::Sha256,
            "sample",
            "81F2F5850BE5BC123C43F71A3033E9384611C545",
            "4CDD914B65EB6C66A8AAAD27299BEE6B035F5E89",
        );
        check(
            HashAlgorithm::Sha512,
            "test",
            "8EA47E475BA8AC6F2D821DA3BD212D11A3DEB9A0",
            "7C670C7AD72B6C050C109E1790008097125433E8",
        );
    }

    #[test]
    fn test_dsa_all_hashes() {
        let (params, key) = test_key();
        for hash in [
            HashAlgorithm::Md5,
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha224,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            let digest = hash.digest(b"abc").unwrap();
            let (r, s) = key.sign(&params, hash, &digest).unwrap();
            assert!(verify(&params, &digest, &r, &s), "{:?}", hash);
        }
    }

    #[test]
    fn test_dsa_tamper() {
        let (params, key) = test_key();
        let digest = HashAlgorithm::Sha256.digest(b"data").unwrap();
        let (r, s) = key.sign(&params, HashAlgorithm::Sha256, &digest).unwrap();

        let mut other = digest.clone();
        other[3] ^= 0x01;
        assert!(!verify(&params, &other, &r, &s));
        assert!(!verify(&params, &digest, &s, &r));
        assert!(!verify(&params, &digest, &Mpi::from_slice(&[]), &s));
    }
}
