//! Dispatch tree nodes
//!
//! Each branch extracts one bit field of the RCA and selects a child with
//! it. Leaves name an endpoint in the [`EndpointTable`](crate::endpoint::EndpointTable).

use crate::endpoint::EndpointId;
use crate::error::{DispatchError, DispatchResult};

use super::context::{Field, RoutingContext};
use super::CapabilityLookup;

/// RCA bit field selecting a child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector {
    pub mask: u32,
    pub shift: u32,
    /// Context field recording the selected index, if any
    pub field: Option<Field>,
}

impl Selector {
    pub const fn new(mask: u32, shift: u32) -> Self {
        Self {
            mask,
            shift,
            field: None,
        }
    }

    pub const fn recording(mut self, field: Field) -> Self {
        self.field = Some(field);
        self
    }

    pub fn index(self, rca: u32) -> u32 {
        (rca & self.mask) >> self.shift
    }
}

/// Precondition checked before descending into a branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// The cartridge recorded in the context must be powered
    CartridgePower,
}

#[derive(Debug, Clone)]
pub struct Branch {
    pub name: &'static str,
    /// `None` for single-child branches that always descend
    pub selector: Option<Selector>,
    pub available: bool,
    pub guard: Option<Guard>,
    pub children: Vec<DispatchNode>,
}

impl Branch {
    pub fn new(name: &'static str, selector: Selector, children: Vec<DispatchNode>) -> Self {
        Self {
            name,
            selector: Some(selector),
            available: true,
            guard: None,
            children,
        }
    }

    /// Branch with one child and no index
    pub fn single(name: &'static str, child: DispatchNode) -> Self {
        Self {
            name,
            selector: None,
            available: true,
            guard: None,
            children: vec![child],
        }
    }

    /// Branch for hardware that is not fitted
    pub fn unavailable(name: &'static str) -> Self {
        Self {
            name,
            selector: None,
            available: false,
            guard: None,
            children: Vec::new(),
        }
    }

    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }
}

#[derive(Debug, Clone)]
pub enum DispatchNode {
    Branch(Branch),
    Leaf(EndpointId),
    /// Address slot with nothing behind it
    Reserved,
}

impl From<Branch> for DispatchNode {
    fn from(branch: Branch) -> Self {
        Self::Branch(branch)
    }
}

impl DispatchNode {
    /// Walk the tree down to an endpoint
    ///
    /// Returns the endpoint together with the routing context accumulated
    /// on the way.
    pub fn resolve(
        &self,
        rca: u32,
        mut ctx: RoutingContext,
        caps: &dyn CapabilityLookup,
    ) -> DispatchResult<(EndpointId, RoutingContext)> {
        let mut node = self;
        loop {
            match node {
                Self::Leaf(id) => return Ok((*id, ctx)),
                Self::Reserved => {
                    return Err(DispatchError::HardwareNotInstalled(format!(
                        "reserved slot at RCA 0x{:05X}",
                        rca
                    )))
                },
                Self::Branch(branch) => {
                    if !branch.available {
                        return Err(DispatchError::HardwareNotInstalled(branch.name.to_string()));
                    }
                    if let Some(Guard::CartridgePower) = branch.guard {
                        caps.check_power(ctx.module)?;
                    }
                    let index = branch.selector.map_or(0, |s| s.index(rca));
                    node = branch.children.get(index as usize).ok_or_else(|| {
                        DispatchError::AddressRange {
                            rca,
                            node: branch.name.to_string(),
                            index,
                            size: branch.children.len(),
                        }
                    })?;
                    if let Some(field) = branch.selector.and_then(|s| s.field) {
                        ctx = ctx.with(field, index as u8);
                    }
                },
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::endpoint::{Endpoint, EndpointTable, Format, Kind};
    use crate::hardware::Point;

    struct Caps {
        powered: bool,
    }

    impl CapabilityLookup for Caps {
        fn check_power(&self, module: u8) -> DispatchResult<()> {
            if self.powered {
                Ok(())
            } else {
                Err(DispatchError::HardwareBlocked(format!("cartridge {} off", module)))
            }
        }

        fn standby2(&self, _module: u8) -> bool {
            false
        }
    }

    fn tree(table: &mut EndpointTable) -> (DispatchNode, EndpointId, EndpointId) {
        let a = table.push(Endpoint::new("a", Kind::ReadOnly, Format::Float, Point::SisCurrent));
        let b = table.push(Endpoint::new("b", Kind::ReadOnly, Format::Float, Point::SisVoltage));
        let inner = Branch::new(
            "inner",
            Selector::new(0x0F0, 4).recording(Field::Sideband),
            vec![DispatchNode::Leaf(a), DispatchNode::Reserved, DispatchNode::Leaf(b)],
        )
        .with_guard(Guard::CartridgePower);
        let root = Branch::new(
            "root",
            Selector::new(0xF000, 12).recording(Field::Module),
            vec![inner.into(), Branch::unavailable("absent").into()],
        );
        (root.into(), a, b)
    }

    #[test]
    fn test_resolve_records_context() {
        let mut table = EndpointTable::new();
        let (root, _, b) = tree(&mut table);
        let (id, ctx) = root
            .resolve(0x0020, RoutingContext::default(), &Caps { powered: true })
            .unwrap();
        assert_eq!(id, b);
        assert_eq!(ctx.module, 0);
        assert_eq!(ctx.sideband, 2);
    }

    #[test]
    fn test_resolve_errors() {
        let mut table = EndpointTable::new();
        let (root, _, _) = tree(&mut table);
        let caps = Caps { powered: true };
        let ctx = RoutingContext::default();

        assert!(matches!(
            root.resolve(0x0030, ctx, &caps),
            Err(DispatchError::AddressRange { index: 3, size: 3, .. })
        ));
        assert!(matches!(
            root.resolve(0x0010, ctx, &caps),
            Err(DispatchError::HardwareNotInstalled(_))
        ));
        assert!(matches!(
            root.resolve(0x1000, ctx, &caps),
            Err(DispatchError::HardwareNotInstalled(ref n)) if n == "absent"
        ));
        assert!(matches!(
            root.resolve(0x5000, ctx, &caps),
            Err(DispatchError::AddressRange { index: 5, .. })
        ));
        assert!(matches!(
            root.resolve(0x0000, ctx, &Caps { powered: false }),
            Err(DispatchError::HardwareBlocked(_))
        ));
    }

    #[test]
    fn test_single_branch_ignores_bits() {
        let mut table = EndpointTable::new();
        let id = table.push(Endpoint::new("led", Kind::ReadWrite, Format::Bool, Point::LnaLedEnable));
        let node: DispatchNode = Branch::single("led", DispatchNode::Leaf(id)).into();
        let (found, _) = node
            .resolve(0xFFFF, RoutingContext::default(), &Caps { powered: true })
            .unwrap();
        assert_eq!(found, id);
    }
}
