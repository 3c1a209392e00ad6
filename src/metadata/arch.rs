//! Target architectures a record or module can be scoped to.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// A build target architecture.
///
/// Records carry the architecture of the section they were declared in; `COMMON` sections
/// apply to every architecture.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Arch {
    /// Applies to every architecture
    #[strum(serialize = "COMMON")]
    Common,
    /// 32-bit x86
    #[strum(serialize = "IA32")]
    Ia32,
    /// x86-64
    #[strum(serialize = "X64")]
    X64,
    /// Itanium
    #[strum(serialize = "IPF")]
    Ipf,
    /// EFI byte code
    #[strum(serialize = "EBC")]
    Ebc,
    /// 32-bit ARM
    #[strum(serialize = "ARM")]
    Arm,
    /// 64-bit ARM
    #[strum(serialize = "AARCH64")]
    Aarch64,
    /// 64-bit RISC-V
    #[strum(serialize = "RISCV64")]
    RiscV64,
    /// 64-bit LoongArch
    #[strum(serialize = "LOONGARCH64")]
    LoongArch64,
}

impl Arch {
    /// Returns true if a record scoped to `self` applies when building for `target`
    #[must_use]
    pub fn applies_to(self, target: Arch) -> bool {
        self == Arch::Common || self == target
    }
}
