//! Catalog and product management handlers.
//!
//! Each handler resolves the actor, asks the policy, then touches the store.
//! Writes run inside a transaction; an image saved for a write that does not
//! commit is removed again, and an image replaced or orphaned by a committed
//! write is removed afterwards.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::context::{RequestContext, DASHBOARD_PATH};
use super::error::{AppError, FieldErrors};
use super::render_template;
use super::templates::{
    AdminDashboardTemplate, CatalogTemplate, EditProductTemplate, FarmerDashboardTemplate, Nav,
    ProductRow,
};
use super::validation::{validate_product, ProductFormValues};
use crate::auth::policy::{self, can_act, Action};
use crate::config::FarmerScope;
use crate::db::{NewProduct, Product, ProductUpdate, User};
use crate::AppState;

/// A file sent in the `image` field
struct UploadedImage {
    file_name: String,
    bytes: Bytes,
}

/// Everything a product form submits
#[derive(Default)]
struct ProductForm {
    values: ProductFormValues,
    image: Option<UploadedImage>,
    /// Upload problems found while reading the body
    errors: FieldErrors,
}

async fn read_fields(multipart: &mut Multipart, form: &mut ProductForm) -> Result<(), MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "name" => form.values.name = field.text().await?,
            "description" => form.values.description = field.text().await?,
            "price" => form.values.price = field.text().await?,
            "quantity" => form.values.quantity = field.text().await?,
            "in_stock" => {
                let value = field.text().await?;
                form.values.in_stock = !matches!(value.trim(), "" | "off" | "false" | "0");
            }
            "image" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await?;
                // browsers send an empty part when no file was chosen
                if !file_name.is_empty() || !bytes.is_empty() {
                    form.image = Some(UploadedImage { file_name, bytes });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Read a product form; a body over the size limit becomes an `image` field error
async fn read_product_form(
    mut multipart: Multipart,
    max_upload_bytes: usize,
) -> Result<ProductForm, AppError> {
    let mut form = ProductForm::default();

    if let Err(e) = read_fields(&mut multipart, &mut form).await {
        if e.status() != StatusCode::PAYLOAD_TOO_LARGE {
            return Err(e.into());
        }
        debug!(max_upload_bytes, "Upload exceeded the body limit");
        form.image = None;
        form.errors.add(
            "image",
            format!(
                "The uploaded file is too large (max {} bytes)",
                max_upload_bytes
            ),
        );
    }

    Ok(form)
}

fn parse_id(ctx: &RequestContext, raw: &str) -> Result<i64, AppError> {
    raw.parse().map_err(|_| ctx.not_found())
}

/// Store an uploaded image; unacceptable uploads come back as an `image` field error
async fn save_image(
    state: &AppState,
    upload: Option<&UploadedImage>,
) -> Result<Option<String>, AppError> {
    let Some(upload) = upload else {
        return Ok(None);
    };

    match state.images.save(&upload.bytes, &upload.file_name).await {
        Ok(name) => Ok(Some(name)),
        Err(e) if e.is_rejection() => {
            let mut errors = FieldErrors::new();
            errors.add("image", e.to_string());
            Err(AppError::Validation(errors))
        }
        Err(e) => Err(e.into()),
    }
}

/// Best-effort removal of a stored image no product refers to any more
async fn discard_image(state: &AppState, name: Option<&str>) {
    let Some(name) = name.filter(|n| !n.is_empty()) else {
        return;
    };
    if let Err(e) = state.images.delete(name).await {
        error!(image = %name, "Failed to delete image: {}", e);
    }
}

/// Load product `id` and check `action` on it.
///
/// A missing product and a forbidden one produce the same redirect.
async fn authorized_product(
    state: &AppState,
    ctx: &RequestContext,
    id: i64,
    action: Action,
) -> Result<Product, AppError> {
    let actor = ctx.require_actor()?;
    let product = Product::get(&state.db, id).await?;

    if can_act(Some(actor), action, product.as_ref()) {
        return product.ok_or_else(|| ctx.not_found());
    }

    match product {
        None => {
            debug!(product_id = id, actor_id = actor.user_id, %action, "Product not found");
            Err(ctx.not_found())
        }
        Some(_) => {
            debug!(product_id = id, actor_id = actor.user_id, %action, "Action denied");
            Err(ctx.denied())
        }
    }
}

// Public catalog
pub(super) async fn catalog(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Response, AppError> {
    let products = Product::list(&state.db, &policy::catalog_filter()).await?;

    let template = CatalogTemplate {
        nav: Nav::new(ctx.actor.as_ref()),
        products,
    };
    render_template(&template, StatusCode::OK)
}

// Role-resolved dashboard
pub(super) async fn dashboard(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Response, AppError> {
    render_dashboard(
        &state,
        &ctx,
        ProductFormValues::default(),
        FieldErrors::new(),
        StatusCode::OK,
    )
    .await
}

async fn render_dashboard(
    state: &AppState,
    ctx: &RequestContext,
    form: ProductFormValues,
    errors: FieldErrors,
    status: StatusCode,
) -> Result<Response, AppError> {
    let actor = ctx.require_actor()?;
    let scope = state.config.catalog.farmer_scope;
    let image_required = state.config.storage.require_image;
    let filter = policy::dashboard_filter(actor, scope);

    if can_act(Some(actor), Action::ViewAdminDashboard, None) {
        let products = Product::list(&state.db, &filter).await?;
        let owners: HashMap<i64, String> = User::list_all(&state.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        let rows = products
            .into_iter()
            .map(|product| {
                let owner = product
                    .owner_id
                    .and_then(|id| owners.get(&id).cloned())
                    .unwrap_or_else(|| "-".to_string());
                ProductRow { product, owner }
            })
            .collect();

        let template = AdminDashboardTemplate {
            nav: Nav::new(Some(actor)),
            products: rows,
            form,
            errors,
            image_required,
        };
        return render_template(&template, status);
    }

    if can_act(Some(actor), Action::ViewOwnDashboard, None) {
        let products = Product::list(&state.db, &filter).await?;

        let template = FarmerDashboardTemplate {
            nav: Nav::new(Some(actor)),
            products,
            form,
            errors,
            image_required,
            whole_catalog: scope == FarmerScope::All,
            user_id: actor.user_id,
        };
        return render_template(&template, status);
    }

    Err(AppError::Denied { home: "/" })
}

// Create product
pub(super) async fn create_product(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let actor = ctx.require_actor()?;
    if !can_act(Some(actor), Action::CreateProduct, None) {
        debug!(actor_id = actor.user_id, "Product creation denied");
        return Err(ctx.denied());
    }

    let form = read_product_form(multipart, state.config.storage.max_upload_bytes).await?;
    let mut values = form.values;
    values.in_stock = true;

    let mut errors = form.errors;
    let input = match validate_product(&values) {
        Ok(input) => Some(input),
        Err(invalid) => {
            errors.merge(invalid);
            None
        }
    };
    if form.image.is_none() && state.config.storage.require_image && !errors.has("image") {
        errors.add("image", "An image of the product is required");
    }
    let input = match input {
        Some(input) if errors.is_empty() => input,
        _ => {
            return render_dashboard(&state, &ctx, values, errors, StatusCode::BAD_REQUEST).await
        }
    };

    let image = match save_image(&state, form.image.as_ref()).await {
        Ok(image) => image,
        Err(AppError::Validation(errors)) => {
            return render_dashboard(&state, &ctx, values, errors, StatusCode::BAD_REQUEST).await
        }
        Err(e) => return Err(e),
    };

    let fields = NewProduct {
        name: input.name,
        description: input.description,
        price_cents: input.price_cents,
        quantity: input.quantity,
        image: image.clone().unwrap_or_default(),
        owner_id: policy::owner_for_new_product(actor),
    };

    let created = async {
        let mut tx = state.db.begin().await?;
        let product = Product::create(&mut *tx, &fields).await?;
        tx.commit().await?;
        Ok::<_, sqlx::Error>(product)
    }
    .await;

    let product = match created {
        Ok(product) => product,
        Err(e) => {
            discard_image(&state, image.as_deref()).await;
            return Err(e.into());
        }
    };

    info!(
        product_id = product.id,
        actor_id = actor.user_id,
        owner_id = ?product.owner_id,
        "Product created"
    );
    Ok(Redirect::to(DASHBOARD_PATH).into_response())
}

fn render_edit(
    ctx: &RequestContext,
    product: Product,
    form: ProductFormValues,
    errors: FieldErrors,
    status: StatusCode,
) -> Result<Response, AppError> {
    let template = EditProductTemplate {
        nav: Nav::new(ctx.actor.as_ref()),
        product,
        form,
        errors,
    };
    render_template(&template, status)
}

// Edit product form
pub(super) async fn edit_product_form(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&ctx, &id)?;
    let product = authorized_product(&state, &ctx, id, Action::EditProduct).await?;

    let form = ProductFormValues::from(&product);
    render_edit(&ctx, product, form, FieldErrors::new(), StatusCode::OK)
}

// Edit product submit
pub(super) async fn update_product(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let id = parse_id(&ctx, &id)?;
    let product = authorized_product(&state, &ctx, id, Action::EditProduct).await?;
    let actor_id = ctx.require_actor()?.user_id;

    let form = read_product_form(multipart, state.config.storage.max_upload_bytes).await?;
    let values = form.values;

    let mut errors = form.errors;
    let input = match validate_product(&values) {
        Ok(input) if errors.is_empty() => input,
        Ok(_) => {
            return render_edit(&ctx, product, values, errors, StatusCode::BAD_REQUEST);
        }
        Err(invalid) => {
            errors.merge(invalid);
            return render_edit(&ctx, product, values, errors, StatusCode::BAD_REQUEST);
        }
    };

    let new_image = match save_image(&state, form.image.as_ref()).await {
        Ok(image) => image,
        Err(AppError::Validation(errors)) => {
            return render_edit(&ctx, product, values, errors, StatusCode::BAD_REQUEST);
        }
        Err(e) => return Err(e),
    };

    let update = ProductUpdate {
        name: input.name,
        description: input.description,
        price_cents: input.price_cents,
        quantity: input.quantity,
        in_stock: input.in_stock,
        image: new_image.clone(),
    };

    let updated = async {
        let mut tx = state.db.begin().await?;
        let updated = Product::update(&mut *tx, product.id, &update).await?;
        tx.commit().await?;
        Ok::<_, sqlx::Error>(updated)
    }
    .await;

    let updated = match updated {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            discard_image(&state, new_image.as_deref()).await;
            return Err(ctx.not_found());
        }
        Err(e) => {
            discard_image(&state, new_image.as_deref()).await;
            return Err(e.into());
        }
    };

    if new_image.is_some() && product.image != updated.image {
        discard_image(&state, Some(&product.image)).await;
    }

    info!(product_id = updated.id, actor_id, "Product updated");
    Ok(Redirect::to(DASHBOARD_PATH).into_response())
}

// Delete product
pub(super) async fn delete_product(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&ctx, &id)?;
    let product = authorized_product(&state, &ctx, id, Action::DeleteProduct).await?;
    let actor_id = ctx.require_actor()?.user_id;

    let deleted = async {
        let mut tx = state.db.begin().await?;
        let deleted = Product::delete(&mut *tx, product.id).await?;
        tx.commit().await?;
        Ok::<_, sqlx::Error>(deleted)
    }
    .await?;

    if deleted {
        discard_image(&state, Some(&product.image)).await;
        info!(product_id = product.id, actor_id, "Product deleted");
    }

    Ok(Redirect::to(DASHBOARD_PATH).into_response())
}
