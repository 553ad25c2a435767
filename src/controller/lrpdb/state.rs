//! Status bitmasks of a pluggable database
//!
//! Two masks are persisted in the LRPDB status: the PDB mask records which
//! sub-lifecycles completed (or failed), the config map mask tracks the
//! parameter map. Both are rendered as `[<value>]|NAME|NAME|` next to the raw
//! value so `kubectl get` shows them readably.
//!
//! Each flag is a constant of its own mask type, so a config map flag cannot
//! be tested against the PDB mask. The raw integer only appears when a mask is
//! read from or written to the status.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::crd::LrpdbStatus;

pub const PDBCRT: PdbMask = PdbMask(0x0000_0001);
pub const PDBOPN: PdbMask = PdbMask(0x0000_0002);
pub const PDBCLS: PdbMask = PdbMask(0x0000_0004);
/// Dropped including datafiles
pub const PDBDIC: PdbMask = PdbMask(0x0000_0008);
pub const OCIHDL: PdbMask = PdbMask(0x0000_0010);
pub const OCICON: PdbMask = PdbMask(0x0000_0020);
/// Finalizer registered
pub const FNALAZ: PdbMask = PdbMask(0x0000_0040);
pub const PDBUPL: PdbMask = PdbMask(0x0000_0080);
pub const PDBPLG: PdbMask = PdbMask(0x0000_0100);
pub const PDBCRE: PdbMask = PdbMask(0x0000_1000);
pub const PDBOPE: PdbMask = PdbMask(0x0000_2000);
pub const PDBCLE: PdbMask = PdbMask(0x0000_4000);
pub const OCIHDE: PdbMask = PdbMask(0x0000_8000);
pub const OCICOE: PdbMask = PdbMask(0x0001_0000);
/// Drop failed, finalizer kept
pub const FNALAE: PdbMask = PdbMask(0x0002_0000);
pub const PDBUPE: PdbMask = PdbMask(0x0004_0000);
pub const PDBPLE: PdbMask = PdbMask(0x0008_0000);
pub const PDBPLW: PdbMask = PdbMask(0x0010_0000);
/// LREST could not be reached
pub const PDBCNE: PdbMask = PdbMask(0x0020_0000);
pub const PDBAUT: PdbMask = PdbMask(0x0100_0000);

pub const MPAPPL: ConfigMapMask = ConfigMapMask(0x0000_0001);
pub const MPSYNC: ConfigMapMask = ConfigMapMask(0x0000_0002);
pub const MPEMPT: ConfigMapMask = ConfigMapMask(0x0000_0004);
pub const MPWARN: ConfigMapMask = ConfigMapMask(0x0000_0008);
pub const MPINIT: ConfigMapMask = ConfigMapMask(0x0000_0010);
pub const SPARE3: ConfigMapMask = ConfigMapMask(0x0000_0020);

const PDB_BITS: &[(PdbMask, &str)] = &[
    (PDBCRT, "PDBCRT"),
    (PDBOPN, "PDBOPN"),
    (PDBCLS, "PDBCLS"),
    (PDBDIC, "PDBDIC"),
    (OCIHDL, "OCIHDL"),
    (OCICON, "OCICON"),
    (FNALAZ, "FNALAZ"),
    (PDBUPL, "PDBUPL"),
    (PDBPLG, "PDBPLG"),
    (PDBCRE, "PDBCRE"),
    (PDBOPE, "PDBOPE"),
    (PDBCLE, "PDBCLE"),
    (OCIHDE, "OCIHDE"),
    (OCICOE, "OCICOE"),
    (FNALAE, "FNALAE"),
    (PDBUPE, "PDBUPE"),
    (PDBPLE, "PDBPLE"),
    (PDBPLW, "PDBPLW"),
    (PDBAUT, "PDBAUT"),
    (PDBCNE, "PDBCNE"),
];

const CONFIG_MAP_BITS: &[(ConfigMapMask, &str)] = &[
    (MPAPPL, "MPAPPL"),
    (MPSYNC, "MPSYNC"),
    (MPEMPT, "MPEMPT"),
    (MPWARN, "MPWARN"),
    (MPINIT, "MPINIT"),
    (SPARE3, "SPARE3"),
];

macro_rules! bitmask {
    ($(#[$meta:meta])* $name:ident, $table:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            pub const EMPTY: Self = Self(0);

            /// Mask as persisted in the status
            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> u32 {
                self.0
            }

            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// True when any of `flags` is set
            pub fn any(self, flags: Self) -> bool {
                self.0 & flags.0 != 0
            }

            /// True when every one of `flags` is set
            pub fn all(self, flags: Self) -> bool {
                self.0 & flags.0 == flags.0
            }

            pub fn insert(&mut self, flags: Self) {
                self.0 |= flags.0;
            }

            pub fn remove(&mut self, flags: Self) {
                self.0 &= !flags.0;
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "[{}]|", self.0)?;
                for (flag, label) in $table {
                    if self.any(*flag) {
                        write!(f, "{label}|")?;
                    }
                }
                Ok(())
            }
        }
    };
}

bitmask!(
    /// Sub-lifecycle progress of one PDB
    PdbMask,
    PDB_BITS
);

bitmask!(
    /// Progress of the parameter config map
    ConfigMapMask,
    CONFIG_MAP_BITS
);

pub fn pdb_mask(status: Option<&LrpdbStatus>) -> PdbMask {
    PdbMask::from_bits(status.map(|s| s.pdb_bit_mask).unwrap_or_default())
}

pub fn config_map_mask(status: Option<&LrpdbStatus>) -> ConfigMapMask {
    ConfigMapMask::from_bits(status.map(|s| s.bitstat).unwrap_or_default())
}

/// Set and clear PDB bits, keeping the rendered string in step
pub fn update_pdb_bits(status: &mut LrpdbStatus, set: PdbMask, clear: PdbMask) {
    let mut mask = PdbMask::from_bits(status.pdb_bit_mask);
    mask.remove(clear);
    mask.insert(set);
    replace_pdb_mask(status, mask);
}

pub fn replace_pdb_mask(status: &mut LrpdbStatus, mask: PdbMask) {
    status.pdb_bit_mask = mask.bits();
    status.pdb_bit_mask_str = mask.to_string();
}

pub fn update_config_map_bits(
    status: &mut LrpdbStatus,
    set: ConfigMapMask,
    clear: ConfigMapMask,
) {
    let mut mask = ConfigMapMask::from_bits(status.bitstat);
    mask.remove(clear);
    mask.insert(set);
    status.bitstat = mask.bits();
    status.bitstatstr = mask.to_string();
}
