// Askama template definitions

use askama::Template;

use super::error::FieldErrors;
use super::validation::ProductFormValues;
use crate::auth::Actor;
use crate::db::Product;

/// Navigation bar state shared by every page
pub struct Nav {
    pub signed_in: bool,
    pub username: String,
    pub role: String,
    pub version: String,
}

impl Nav {
    pub fn new(actor: Option<&Actor>) -> Self {
        Self {
            signed_in: actor.is_some(),
            username: actor.map(|a| a.username.clone()).unwrap_or_default(),
            role: actor.map(|a| a.role.to_string()).unwrap_or_default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// Product with the name of its owner, for the admin view
pub struct ProductRow {
    pub product: Product,
    pub owner: String, // "-" when the product has no owner
}

impl From<&Product> for ProductFormValues {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description_text().to_string(),
            price: product.price_display(),
            quantity: product.quantity.clone(),
            in_stock: product.in_stock,
        }
    }
}

// Public catalog
#[derive(Template)]
#[template(path = "catalog.html")]
pub struct CatalogTemplate {
    pub nav: Nav,
    pub products: Vec<Product>,
}

// Login template
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub nav: Nav,
    pub error: Option<String>,
    pub username: String,
}

// Admin dashboard: every product, with owners
#[derive(Template)]
#[template(path = "admin_dashboard.html")]
pub struct AdminDashboardTemplate {
    pub nav: Nav,
    pub products: Vec<ProductRow>,
    pub form: ProductFormValues,
    pub errors: FieldErrors,
    pub image_required: bool,
}

// Farmer dashboard
#[derive(Template)]
#[template(path = "farmer_dashboard.html")]
pub struct FarmerDashboardTemplate {
    pub nav: Nav,
    pub products: Vec<Product>,
    pub form: ProductFormValues,
    pub errors: FieldErrors,
    pub image_required: bool,
    pub whole_catalog: bool,
    pub user_id: i64,
}

// Edit product form
#[derive(Template)]
#[template(path = "edit_product.html")]
pub struct EditProductTemplate {
    pub nav: Nav,
    pub product: Product,
    pub form: ProductFormValues,
    pub errors: FieldErrors,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Role;

    fn product(id: i64, name: &str, owner_id: Option<i64>) -> Product {
        Product {
            id,
            name: name.to_string(),
            description: None,
            price_cents: 350,
            quantity: "1kg".to_string(),
            image: String::new(),
            in_stock: true,
            owner_id,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_farmer_dashboard_offers_controls_on_owned_rows_only() {
        let actor = Actor {
            user_id: 2,
            username: "farmer1".to_string(),
            role: Role::Farmer,
        };
        let template = FarmerDashboardTemplate {
            nav: Nav::new(Some(&actor)),
            products: vec![product(10, "Tomatoes", Some(2)), product(11, "Leeks", Some(3))],
            form: ProductFormValues::default(),
            errors: FieldErrors::new(),
            image_required: true,
            whole_catalog: true,
            user_id: actor.user_id,
        };

        let html = template.render().unwrap();
        assert!(html.contains("Welcome, farmer1"));
        assert!(html.contains("Tomatoes"));
        assert!(html.contains("Leeks"));
        assert!(html.contains("/edit_product/10"));
        assert!(html.contains("/delete_product/10"));
        assert!(!html.contains("/edit_product/11"));
        assert!(!html.contains("/delete_product/11"));
    }
}
