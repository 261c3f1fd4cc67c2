//! Authorization policy: who may do what to which product.
//!
//! Everything here is a pure function of the actor, the action and the
//! product, so handlers can ask before touching the store.

use crate::auth::Actor;
use crate::config::FarmerScope;
use crate::db::{Product, ProductFilter, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewCatalog,
    ViewOwnDashboard,
    ViewAdminDashboard,
    CreateProduct,
    EditProduct,
    DeleteProduct,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ViewCatalog => "view_catalog",
            Action::ViewOwnDashboard => "view_own_dashboard",
            Action::ViewAdminDashboard => "view_admin_dashboard",
            Action::CreateProduct => "create_product",
            Action::EditProduct => "edit_product",
            Action::DeleteProduct => "delete_product",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decide whether `actor` may perform `action` on `resource`.
///
/// Edit and delete need the product itself; asking without one is a denial,
/// which is also how a missing product is treated.
pub fn can_act(actor: Option<&Actor>, action: Action, resource: Option<&Product>) -> bool {
    if action == Action::ViewCatalog {
        return true;
    }

    let Some(actor) = actor else {
        return false;
    };

    match action {
        Action::ViewCatalog => true,
        Action::ViewAdminDashboard => actor.role == Role::Admin,
        Action::ViewOwnDashboard => actor.role == Role::Farmer,
        Action::CreateProduct => matches!(actor.role, Role::Admin | Role::Farmer),
        Action::EditProduct | Action::DeleteProduct => match (actor.role, resource) {
            (_, None) => false,
            (Role::Admin, Some(_)) => true,
            (Role::Farmer, Some(product)) => product.is_owned_by(actor.user_id),
        },
    }
}

/// Owner recorded on a product `actor` creates
pub fn owner_for_new_product(actor: &Actor) -> Option<i64> {
    match actor.role {
        Role::Farmer => Some(actor.user_id),
        Role::Admin => None,
    }
}

/// Products shown on `actor`'s dashboard
pub fn dashboard_filter(actor: &Actor, scope: FarmerScope) -> ProductFilter {
    match (actor.role, scope) {
        (Role::Admin, _) => ProductFilter::all(),
        (Role::Farmer, FarmerScope::Owned) => ProductFilter::owned_by(actor.user_id),
        (Role::Farmer, FarmerScope::All) => ProductFilter::all(),
    }
}

/// Products shown on the public catalog
pub fn catalog_filter() -> ProductFilter {
    ProductFilter::in_stock()
}
