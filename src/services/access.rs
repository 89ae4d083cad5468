//! Back-office permissions.
//!
//! A staff role is resolved into a capability set once per request; every
//! back-office operation then asks [`authorize`] for exactly one capability.

use std::collections::HashSet;

use crate::models::{StaffRole, StaffUser};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ViewOrders,
    CreateManualOrder,
    MarkOrderPaid,
    DeleteOrder,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewOrders => "orders:read",
            Capability::CreateManualOrder => "orders:create",
            Capability::MarkOrderPaid => "orders:mark-paid",
            Capability::DeleteOrder => "orders:delete",
        }
    }
}

fn role_capabilities(role: StaffRole) -> &'static [Capability] {
    use Capability::*;
    match role {
        StaffRole::SuperAdmin | StaffRole::Admin => {
            &[ViewOrders, CreateManualOrder, MarkOrderPaid, DeleteOrder]
        }
        StaffRole::Cashier => &[ViewOrders, CreateManualOrder, MarkOrderPaid],
        StaffRole::Receptionist => &[ViewOrders, MarkOrderPaid],
    }
}

/// An authenticated staff member with their resolved capabilities.
#[derive(Debug, Clone)]
pub struct StaffContext {
    pub user: StaffUser,
    capabilities: HashSet<Capability>,
}

impl StaffContext {
    pub fn resolve(user: StaffUser) -> Self {
        let capabilities = role_capabilities(user.role).iter().copied().collect();
        Self { user, capabilities }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

pub fn authorize(staff: &StaffContext, capability: Capability) -> Result<(), AppError> {
    if staff.can(capability) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role {} lacks permission {}",
            staff.user.role,
            capability.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(role: StaffRole) -> StaffContext {
        StaffContext::resolve(StaffUser { id: 4, role })
    }

    #[test]
    fn test_admin_can_delete_cashier_cannot() {
        assert!(authorize(&staff(StaffRole::Admin), Capability::DeleteOrder).is_ok());
        assert!(authorize(&staff(StaffRole::SuperAdmin), Capability::DeleteOrder).is_ok());
        assert!(matches!(
            authorize(&staff(StaffRole::Cashier), Capability::DeleteOrder),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_receptionist_cannot_create_manual_orders() {
        let receptionist = staff(StaffRole::Receptionist);
        assert!(receptionist.can(Capability::ViewOrders));
        assert!(receptionist.can(Capability::MarkOrderPaid));
        assert!(!receptionist.can(Capability::CreateManualOrder));
    }
}
