//! RCA layout
//!
//! Bit fields of the relative CAN address shared by every module of the
//! front end, plus the special RCAs served outside the hardware tree.

/// Request class selector: 0 monitor, 1 control, 2 special
pub const CLASS_MASK: u32 = 0x30000;
pub const CLASS_SHIFT: u32 = 16;

/// Module selector below the class bits
pub const MODULE_MASK: u32 = 0x0F000;
pub const MODULE_SHIFT: u32 = 12;

/// Offset between a monitor RCA and its control twin
pub const CONTROL_RCA_OFFSET: u32 = 0x10000;

/// Number of module slots behind the module selector (0x0 - 0xE)
pub const MODULES_NUMBER: usize = 15;
pub const CARTRIDGES_NUMBER: usize = 10;

pub const POWER_DISTRIBUTION_MODULE: usize = 0xA;
pub const IF_SWITCH_MODULE: usize = 0xB;
pub const CRYOSTAT_MODULE: usize = 0xC;
pub const LPR_MODULE: usize = 0xD;
pub const FETIM_MODULE: usize = 0xE;

/// Special monitor RCAs
pub const GET_VERSION_INFO: u32 = 0x20002;
pub const GET_SPECIAL_MONITOR_RCAS: u32 = 0x20003;
pub const GET_SPECIAL_CONTROL_RCAS: u32 = 0x20004;
pub const GET_MONITOR_RCAS: u32 = 0x20005;
pub const GET_CONTROL_RCAS: u32 = 0x20006;
pub const GET_LAST_SPECIAL_RESERVED: u32 = 0x20007;
pub const GET_FE_MODE: u32 = 0x2000E;

/// Special control RCAs
pub const SET_FE_MODE: u32 = 0x2100E;

/// Boundaries reported by the RCA range queries
pub const FIRST_SPECIAL_MONITOR_RCA: u32 = 0x20002;
pub const LAST_SPECIAL_MONITOR_RCA: u32 = 0x20FFF;
pub const FIRST_SPECIAL_CONTROL_RCA: u32 = 0x21000;
pub const LAST_SPECIAL_CONTROL_RCA: u32 = 0x21FFF;
pub const FIRST_MONITOR_RCA: u32 = 0x00001;
pub const LAST_MONITOR_RCA: u32 = 0x0FFFF;
pub const FIRST_CONTROL_RCA: u32 = 0x10000;
pub const LAST_CONTROL_RCA: u32 = 0x1FFFF;

/// Request class carried by the RCA itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RcaClass {
    Monitor,
    Control,
    Special,
    /// Class bits `0b11`, never a valid request
    Reserved,
}

impl RcaClass {
    pub fn from_rca(rca: u32) -> Self {
        match (rca & CLASS_MASK) >> CLASS_SHIFT {
            0 => Self::Monitor,
            1 => Self::Control,
            2 => Self::Special,
            _ => Self::Reserved,
        }
    }
}

/// Module index encoded in a monitor or control RCA
pub fn module_index(rca: u32) -> usize {
    ((rca & MODULE_MASK) >> MODULE_SHIFT) as usize
}

/// Monitor RCA for a control RCA (identity for monitor RCAs)
pub fn monitor_rca(rca: u32) -> u32 {
    rca & !CONTROL_RCA_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_decode() {
        assert_eq!(RcaClass::from_rca(0x0_0008), RcaClass::Monitor);
        assert_eq!(RcaClass::from_rca(0x1_0008), RcaClass::Control);
        assert_eq!(RcaClass::from_rca(GET_VERSION_INFO), RcaClass::Special);
        assert_eq!(RcaClass::from_rca(SET_FE_MODE), RcaClass::Special);
        assert_eq!(RcaClass::from_rca(0x3_0000), RcaClass::Reserved);
    }

    #[test]
    fn test_module_index() {
        assert_eq!(module_index(0x0_3000), 3);
        assert_eq!(module_index(0x1_D00C), LPR_MODULE);
        assert_eq!(module_index(0x0_F000), 0xF);
        assert_eq!(monitor_rca(0x1_2008), 0x0_2008);
    }
}
