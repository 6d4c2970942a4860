//! Persisted layout of an escrow account.
//!
//! The account is written by the escrow program and only read here. Layout,
//! fixed at 105 bytes with no version tag:
//!
//! | offset | size | field                           |
//! |--------|------|---------------------------------|
//! | 0      | 1    | `is_initialized`                |
//! | 1      | 32   | `initializer`                   |
//! | 33     | 32   | `temp_token_account`            |
//! | 65     | 32   | `initializer_receiving_account` |
//! | 97     | 8    | `expected_amount` (little-endian) |

use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};

use crate::{
    core::{SdkError, SdkResult, ESCROW_ACCOUNT_LEN},
    prelude::*,
};

/// Decoded escrow account
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EscrowRecord {
    pub is_initialized: bool,
    /// Party that opened the trade
    pub initializer: Pubkey,
    /// Holding account that custodies the offered asset
    pub temp_token_account: Pubkey,
    /// Where the initializer receives the counter-asset
    pub initializer_receiving_account: Pubkey,
    /// Counter-asset quantity required to unlock the trade
    pub expected_amount: u64,
}

impl EscrowRecord {
    pub const LEN: usize = ESCROW_ACCOUNT_LEN;

    /// Decode raw account bytes. Any length other than [`Self::LEN`] is rejected.
    pub fn decode(data: &[u8]) -> SdkResult<Self> {
        if data.len() != Self::LEN {
            return Err(SdkError::MalformedLayout {
                expected: Self::LEN,
                actual: data.len(),
            });
        }

        let src = array_ref![data, 0, EscrowRecord::LEN];
        let (is_initialized, initializer, temp_token_account, receiving, expected_amount) =
            array_refs![src, 1, 32, 32, 32, 8];

        Ok(Self {
            // Any non-zero flag byte counts as set
            is_initialized: is_initialized[0] != 0,
            initializer: Pubkey::new_from_array(*initializer),
            temp_token_account: Pubkey::new_from_array(*temp_token_account),
            initializer_receiving_account: Pubkey::new_from_array(*receiving),
            expected_amount: u64::from_le_bytes(*expected_amount),
        })
    }

    /// Inverse of [`Self::decode`]
    pub fn pack_into_slice(&self, dst: &mut [u8]) -> SdkResult<()> {
        if dst.len() != Self::LEN {
            return Err(SdkError::MalformedLayout {
                expected: Self::LEN,
                actual: dst.len(),
            });
        }

        let dst = array_mut_ref![dst, 0, EscrowRecord::LEN];
        let (is_initialized, initializer, temp_token_account, receiving, expected_amount) =
            mut_array_refs![dst, 1, 32, 32, 32, 8];

        is_initialized[0] = self.is_initialized as u8;
        initializer.copy_from_slice(self.initializer.as_ref());
        temp_token_account.copy_from_slice(self.temp_token_account.as_ref());
        receiving.copy_from_slice(self.initializer_receiving_account.as_ref());
        *expected_amount = self.expected_amount.to_le_bytes();
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; ESCROW_ACCOUNT_LEN] {
        let mut out = [0u8; ESCROW_ACCOUNT_LEN];
        // Cannot fail: the buffer is exactly LEN bytes
        let _ = self.pack_into_slice(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> EscrowRecord {
        EscrowRecord {
            is_initialized: true,
            initializer: Pubkey::new_unique(),
            temp_token_account: Pubkey::new_unique(),
            initializer_receiving_account: Pubkey::new_unique(),
            expected_amount: 20,
        }
    }

    #[test]
    fn test_layout_size_is_fixed() {
        assert_eq!(EscrowRecord::LEN, 105);
        assert_eq!(sample().to_bytes().len(), 105);
    }

    #[test]
    fn test_field_offsets() {
        let record = sample();
        let bytes = record.to_bytes();

        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..33], record.initializer.as_ref());
        assert_eq!(&bytes[33..65], record.temp_token_account.as_ref());
        assert_eq!(&bytes[65..97], record.initializer_receiving_account.as_ref());
        assert_eq!(&bytes[97..105], &[20, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_amount_boundaries() {
        for amount in [0u64, 1, u64::MAX] {
            let record = EscrowRecord {
                expected_amount: amount,
                ..sample()
            };
            let decoded = EscrowRecord::decode(&record.to_bytes()).unwrap();
            assert_eq!(decoded.expected_amount, amount);
        }
    }

    #[test]
    fn test_zeroed_account_decodes_as_uninitialized() {
        let decoded = EscrowRecord::decode(&[0u8; EscrowRecord::LEN]).unwrap();
        assert!(!decoded.is_initialized);
        assert_eq!(decoded, EscrowRecord::default());
    }

    #[test]
    fn test_wrong_lengths_rejected() {
        for len in [0, 104, 106, 210] {
            let err = EscrowRecord::decode(&vec![0u8; len]).unwrap_err();
            match err {
                SdkError::MalformedLayout { expected, actual } => {
                    assert_eq!(expected, 105);
                    assert_eq!(actual, len);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_pack_rejects_short_buffer() {
        let mut buf = [0u8; 104];
        assert!(matches!(
            sample().pack_into_slice(&mut buf),
            Err(SdkError::MalformedLayout { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_decode_reconstructs_fields(
            flag in any::<bool>(),
            initializer in any::<[u8; 32]>(),
            temp in any::<[u8; 32]>(),
            receiving in any::<[u8; 32]>(),
            amount in any::<u64>(),
        ) {
            let record = EscrowRecord {
                is_initialized: flag,
                initializer: Pubkey::new_from_array(initializer),
                temp_token_account: Pubkey::new_from_array(temp),
                initializer_receiving_account: Pubkey::new_from_array(receiving),
                expected_amount: amount,
            };
            prop_assert_eq!(EscrowRecord::decode(&record.to_bytes()).unwrap(), record);
        }

        #[test]
        fn prop_decode_is_total_for_fixed_span(bytes in proptest::collection::vec(any::<u8>(), 105)) {
            prop_assert!(EscrowRecord::decode(&bytes).is_ok());
        }

        #[test]
        fn prop_decode_rejects_other_lengths(len in 0usize..512) {
            prop_assume!(len != EscrowRecord::LEN);
            let is_malformed = matches!(
                EscrowRecord::decode(&vec![0u8; len]),
                Err(SdkError::MalformedLayout { .. })
            );
            prop_assert!(is_malformed);
        }
    }
}
