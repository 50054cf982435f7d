use crate::Generator;
use tokenizable_core::RecordId;
use typed_builder::TypedBuilder;

const LOWER_40_BITS_MASK: u64 = (1_u64 << 40) - 1;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone, TypedBuilder)]
/// A simple multiplicative and XOR-based obfuscation over 40-bit values.
///
/// `prime` is forced odd, so the transform is a bijection on the 40-bit space.
pub struct Obfuscator {
    #[builder(default = 3)]
    prime: u64,
    #[builder(default = 0xDEAD_BEEF_CAFE_BABE)]
    mask: u64,
}

impl Default for Obfuscator {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Obfuscator {
    pub fn prime(&self) -> u64 {
        self.prime | 1
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }

    pub fn obfuscate(&self, source: u64) -> [u8; 5] {
        let source = source & LOWER_40_BITS_MASK;
        let obfuscated = (source.wrapping_mul(self.prime()) ^ self.mask) & LOWER_40_BITS_MASK;
        let bytes = obfuscated.to_be_bytes();
        [bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
    }
}

/// The default token strategy.
///
/// Folds the record id into a 40-bit seed, adds the attempt offset, then
/// obfuscates and base58-encodes the result. For one record, every offset
/// below 2^40 maps to a distinct candidate.
#[derive(Debug, Clone, Default)]
pub struct ObfuscatedGenerator {
    obfuscator: Obfuscator,
}

impl ObfuscatedGenerator {
    pub fn new(obfuscator: Obfuscator) -> Self {
        Self { obfuscator }
    }

    fn seed(discriminator: &RecordId) -> u64 {
        // FNV-1a
        discriminator
            .as_bytes()
            .iter()
            .fold(FNV_OFFSET_BASIS, |hash, byte| {
                (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
            })
    }
}

impl Generator for ObfuscatedGenerator {
    fn generate(&self, discriminator: &RecordId, offset: u64) -> String {
        let source = Self::seed(discriminator).wrapping_add(offset);
        bs58::encode(self.obfuscator.obfuscate(source)).into_string()
    }
}
