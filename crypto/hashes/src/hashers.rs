use crate::Hash;

pub trait HasherBase {
    fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self;
}

pub trait Hasher: HasherBase + Clone + Default {
    fn finalize(self) -> Hash;
    fn reset(&mut self);
    #[inline(always)]
    fn hash<A: AsRef<[u8]>>(data: A) -> Hash {
        let mut hasher = Self::default();
        hasher.update(data);
        hasher.finalize()
    }
}

macro_rules! blake2b_hasher {
    ($(struct $name:ident => $domain_sep:literal),+ $(,)? ) => {$(
        #[derive(Clone)]
        pub struct $name(blake2b_simd::State);

        impl $name {
            #[inline(always)]
            pub fn new() -> Self {
                Self(
                    blake2b_simd::Params::new()
                        .hash_length(32)
                        .key($domain_sep)
                        .to_state(),
                )
            }

            pub fn write<A: AsRef<[u8]>>(&mut self, data: A) {
                self.0.update(data.as_ref());
            }

            #[inline(always)]
            pub fn finalize(self) -> crate::Hash {
                let mut out = [0u8; 32];
                out.copy_from_slice(self.0.finalize().as_bytes());
                crate::Hash::from_bytes(out)
            }
        }

        impl HasherBase for $name {
            #[inline(always)]
            fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self {
                self.write(data);
                self
            }
        }

        impl Hasher for $name {
            #[inline(always)]
            fn finalize(self) -> crate::Hash {
                $name::finalize(self)
            }

            #[inline(always)]
            fn reset(&mut self) {
                *self = Self::new();
            }
        }

        impl Default for $name {
            #[inline(always)]
            fn default() -> Self {
                Self::new()
            }
        }
    )*};
}

blake2b_hasher! {
    struct RegionHash => b"RegionHash",
    struct ConflictSetHash => b"ConflictSetHash",
    struct LinkHash => b"LinkHash",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_separation() {
        let data = b"same payload";
        let region = RegionHash::hash(data);
        let conflict = ConflictSetHash::hash(data);
        let link = LinkHash::hash(data);
        assert_ne!(region, conflict);
        assert_ne!(region, link);
        assert_ne!(conflict, link);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut hasher = LinkHash::new();
        hasher.update(b"left").update(b"right");
        assert_eq!(hasher.finalize(), LinkHash::hash(b"leftright"));

        let mut hasher = RegionHash::new();
        hasher.update(b"garbage");
        hasher.reset();
        hasher.update(b"payload");
        assert_eq!(hasher.finalize(), RegionHash::hash(b"payload"));
    }
}
