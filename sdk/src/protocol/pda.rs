use crate::{core::constants::seeds, prelude::*};

/// Keyless program-derived address and the bump that produced it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DerivedAuthority {
    pub address: Pubkey,
    pub bump: u8,
}

/// Derive an address from `seed` under `program_id` with the canonical bump
/// search (255 downward until the candidate is off-curve), the same search the
/// program runs when it validates the account.
pub fn derive(seed: &[u8], program_id: &Pubkey) -> DerivedAuthority {
    let (address, bump) = Pubkey::find_program_address(&[seed], program_id);
    DerivedAuthority { address, bump }
}

/// PDA builder for escrow program addresses
#[derive(Clone, Copy, Debug)]
pub struct PdaBuilder {
    pub program_id: Pubkey,
}

impl PdaBuilder {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    /// Authority that owns holding accounts while a trade is open
    pub fn escrow_authority(&self) -> DerivedAuthority {
        derive(seeds::ESCROW, &self.program_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic() {
        let program_id = Pubkey::new_unique();
        let first = derive(seeds::ESCROW, &program_id);
        let second = derive(seeds::ESCROW, &program_id);
        assert_eq!(first, second);
    }

    #[test]
    fn test_bump_reproduces_address() {
        let program_id = Pubkey::new_unique();
        let authority = derive(seeds::ESCROW, &program_id);
        let recreated =
            Pubkey::create_program_address(&[seeds::ESCROW, &[authority.bump]], &program_id)
                .unwrap();
        assert_eq!(recreated, authority.address);
    }

    #[test]
    fn test_bump_is_canonical() {
        let program_id = Pubkey::new_unique();
        let authority = derive(seeds::ESCROW, &program_id);
        // Every higher bump must fail to produce a valid address
        for bump in (authority.bump as u16 + 1)..=255 {
            assert!(
                Pubkey::create_program_address(&[seeds::ESCROW, &[bump as u8]], &program_id)
                    .is_err()
            );
        }
    }

    #[test]
    fn test_program_id_changes_address() {
        let a = derive(seeds::ESCROW, &Pubkey::new_unique());
        let b = derive(seeds::ESCROW, &Pubkey::new_unique());
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn test_builder_uses_escrow_seed() {
        let program_id = Pubkey::new_unique();
        assert_eq!(
            PdaBuilder::new(program_id).escrow_authority(),
            derive(b"escrow", &program_id)
        );
    }
}
