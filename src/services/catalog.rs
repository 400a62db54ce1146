//! Catalog reads and the listing lifecycle of materials.

use std::io;
use std::path::PathBuf;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use validator::Validate;

use crate::config::{ALLOWED_EXTENSIONS, CATALOG_PAGE_SIZE};
use crate::error::{CommerceError, is_unique_violation};
use crate::models::catalog::{
    BrowseParams, Category, CategoryPage, CreateCategoryRequest, CreateUniversityRequest,
    HomeResponse, Page, SearchHit, Tag, University,
};
use crate::models::material::{
    Material, MaterialDetail, MaterialFlagsRequest, MaterialForm, MaterialSummary,
    SUMMARY_COLUMNS, Upload,
};
use crate::models::user::PublicUser;
use crate::services::{entitlement, reviews};
use crate::storage::{FileStore, StoredFile};
use crate::utils::html::{clean_html, clean_optional};
use crate::utils::money::{parse_amount_cents, parse_price_cents};

const PREVIEW_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
const MAX_TAG_LEN: usize = 50;

/// Materials on the landing page.
pub async fn home(pool: &SqlitePool) -> Result<HomeResponse, CommerceError> {
    let featured = summaries_where(pool, "m.is_featured = 1", "m.created_at DESC", 6).await?;
    let best_sellers = summaries_where(pool, "m.is_best_seller = 1", "m.downloads DESC", 4).await?;
    let recent = summaries_where(pool, "1 = 1", "m.created_at DESC, m.id DESC", 8).await?;

    let total_materials: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM materials WHERE is_active = 1")
            .fetch_one(pool)
            .await?;
    let total_sellers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_seller = 1")
        .fetch_one(pool)
        .await?;

    Ok(HomeResponse {
        categories: categories(pool).await?,
        featured,
        best_sellers,
        recent,
        total_materials,
        total_sellers,
    })
}

/// Active materials matching a fixed condition. Only called with literals.
async fn summaries_where(
    pool: &SqlitePool,
    condition: &'static str,
    order_by: &'static str,
    limit: i64,
) -> Result<Vec<MaterialSummary>, sqlx::Error> {
    let sql = format!(
        "SELECT {SUMMARY_COLUMNS} FROM materials m JOIN users u ON u.id = m.seller_id \
         WHERE m.is_active = 1 AND {condition} ORDER BY {order_by} LIMIT ?"
    );
    sqlx::query_as::<_, MaterialSummary>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Browse filters after parsing and lookup.
#[derive(Debug, Default)]
struct Filter {
    category_id: Option<i64>,
    min_price_cents: Option<i64>,
    max_price_cents: Option<i64>,
    file_type: Option<String>,
    pattern: Option<String>,
}

impl Filter {
    fn push(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE m.is_active = 1");
        if let Some(category_id) = self.category_id {
            qb.push(" AND m.category_id = ").push_bind(category_id);
        }
        if let Some(min) = self.min_price_cents {
            qb.push(" AND m.price_cents >= ").push_bind(min);
        }
        if let Some(max) = self.max_price_cents {
            qb.push(" AND m.price_cents <= ").push_bind(max);
        }
        if let Some(file_type) = &self.file_type {
            qb.push(" AND m.file_type = ").push_bind(file_type.clone());
        }
        if let Some(pattern) = &self.pattern {
            // LIKE is case-insensitive for ASCII in SQLite.
            qb.push(" AND (m.title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR m.description LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR m.course_code LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR m.subject LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\')");
        }
    }
}

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

async fn resolve_filter(pool: &SqlitePool, params: &BrowseParams) -> Result<Filter, CommerceError> {
    let category_id = match non_blank(&params.category) {
        // An unknown slug filters nothing.
        Some(slug) => category_by_slug(pool, slug).await?.map(|c| c.id),
        None => None,
    };

    Ok(Filter {
        category_id,
        min_price_cents: non_blank(&params.min_price).map(parse_amount_cents).transpose()?,
        max_price_cents: non_blank(&params.max_price).map(parse_amount_cents).transpose()?,
        file_type: non_blank(&params.file_type).map(|t| t.to_ascii_lowercase()),
        pattern: non_blank(&params.q).map(like_pattern),
    })
}

/// Filtered, sorted, paginated catalog listing.
pub async fn browse(
    pool: &SqlitePool,
    params: &BrowseParams,
) -> Result<Page<MaterialSummary>, CommerceError> {
    let filter = resolve_filter(pool, params).await?;
    let page = params.page.unwrap_or(1).max(1);

    let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM materials m");
    filter.push(&mut count_query);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {SUMMARY_COLUMNS} FROM materials m JOIN users u ON u.id = m.seller_id"
    ));
    filter.push(&mut query);
    query
        .push(" ORDER BY ")
        .push(params.sort.order_by())
        .push(" LIMIT ")
        .push_bind(CATALOG_PAGE_SIZE)
        .push(" OFFSET ")
        .push_bind(page_offset(page));

    let items: Vec<MaterialSummary> = query.build_query_as().fetch_all(pool).await?;

    Ok(Page::new(items, page, CATALOG_PAGE_SIZE, total))
}

/// Row offset of a 1-based page. Pages past the end saturate and come back empty.
fn page_offset(page: i64) -> i64 {
    page.saturating_sub(1).saturating_mul(CATALOG_PAGE_SIZE)
}

/// Type-ahead search. Fewer than two characters returns nothing.
pub async fn quick_search(pool: &SqlitePool, q: &str) -> Result<Vec<SearchHit>, CommerceError> {
    let q = q.trim();
    if q.chars().count() < 2 {
        return Ok(Vec::new());
    }
    let pattern = like_pattern(q);

    let hits = sqlx::query_as::<_, SearchHit>(
        r#"
        SELECT m.id, m.title, m.price_cents, c.name AS category
        FROM materials m
        LEFT JOIN categories c ON c.id = m.category_id
        WHERE m.is_active = 1
          AND (m.title LIKE ? ESCAPE '\' OR m.course_code LIKE ? ESCAPE '\' OR m.subject LIKE ? ESCAPE '\')
        ORDER BY m.downloads DESC, m.id DESC
        LIMIT 10
        "#,
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    Ok(hits)
}

pub async fn categories(pool: &SqlitePool) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "SELECT id, name, slug, description, icon, parent_id FROM categories ORDER BY name",
    )
    .fetch_all(pool)
    .await
}

async fn category_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "SELECT id, name, slug, description, icon, parent_id FROM categories WHERE slug = ?",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
}

/// A category and one page of its active materials, newest first.
pub async fn category_page(
    pool: &SqlitePool,
    slug: &str,
    page: Option<i64>,
) -> Result<CategoryPage, CommerceError> {
    let category = category_by_slug(pool, slug)
        .await?
        .ok_or(CommerceError::NotFound("Category"))?;

    let params = BrowseParams {
        category: Some(category.slug.clone()),
        page,
        ..BrowseParams::default()
    };
    let materials = browse(pool, &params).await?;

    Ok(CategoryPage {
        category,
        materials,
    })
}

pub async fn create_category(
    pool: &SqlitePool,
    req: &CreateCategoryRequest,
) -> Result<Category, CommerceError> {
    req.validate()
        .map_err(|e| CommerceError::Validation(e.to_string()))?;

    if let Some(parent_id) = req.parent_id {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?")
            .bind(parent_id)
            .fetch_one(pool)
            .await?;
        if exists == 0 {
            return Err(CommerceError::NotFound("Parent category"));
        }
    }

    sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (name, slug, description, icon, parent_id)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, name, slug, description, icon, parent_id
        "#,
    )
    .bind(req.name.trim())
    .bind(&req.slug)
    .bind(clean_optional(req.description.as_deref()))
    .bind(&req.icon)
    .bind(req.parent_id)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            CommerceError::Validation("Category name or slug already exists".to_string())
        } else {
            CommerceError::from(e)
        }
    })
}

pub async fn universities(pool: &SqlitePool) -> Result<Vec<University>, CommerceError> {
    let list = sqlx::query_as::<_, University>(
        "SELECT id, name, short_name, country, city FROM universities ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(list)
}

pub async fn create_university(
    pool: &SqlitePool,
    req: &CreateUniversityRequest,
) -> Result<University, CommerceError> {
    req.validate()
        .map_err(|e| CommerceError::Validation(e.to_string()))?;

    sqlx::query_as::<_, University>(
        r#"
        INSERT INTO universities (name, short_name, country, city)
        VALUES (?, ?, ?, ?)
        RETURNING id, name, short_name, country, city
        "#,
    )
    .bind(req.name.trim())
    .bind(&req.short_name)
    .bind(&req.country)
    .bind(&req.city)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            CommerceError::Validation("University already exists".to_string())
        } else {
            CommerceError::from(e)
        }
    })
}

async fn fetch_material<'e, E>(executor: E, id: i64) -> Result<Material, CommerceError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Material>("SELECT * FROM materials WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(CommerceError::NotFound("Material"))
}

pub async fn tags_for(pool: &SqlitePool, material_id: i64) -> Result<Vec<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.id, t.name
        FROM tags t
        JOIN material_tags mt ON mt.tag_id = t.id
        WHERE mt.material_id = ?
        ORDER BY t.name
        "#,
    )
    .bind(material_id)
    .fetch_all(pool)
    .await
}

/// Detail view. Counts a view; inactive materials are only visible to
/// people with access.
pub async fn material_detail(
    pool: &SqlitePool,
    id: i64,
    viewer_id: Option<i64>,
) -> Result<MaterialDetail, CommerceError> {
    let material = fetch_material(pool, id).await?;

    let has_purchased = match viewer_id {
        Some(viewer) => entitlement::purchased_item_id(pool, viewer, id).await?.is_some(),
        None => false,
    };
    let is_owner = viewer_id == Some(material.seller_id);
    if !material.is_active && !is_owner && !has_purchased {
        return Err(CommerceError::NotFound("Material"));
    }

    sqlx::query("UPDATE materials SET views = views + 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    let material = fetch_material(pool, id).await?;

    let seller_username: String = sqlx::query_scalar("SELECT username FROM users WHERE id = ?")
        .bind(material.seller_id)
        .fetch_one(pool)
        .await?;
    let category: Option<String> = match material.category_id {
        Some(category_id) => {
            sqlx::query_scalar("SELECT name FROM categories WHERE id = ?")
                .bind(category_id)
                .fetch_optional(pool)
                .await?
        }
        None => None,
    };

    let related = sqlx::query_as::<_, MaterialSummary>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM materials m JOIN users u ON u.id = m.seller_id \
         WHERE m.is_active = 1 AND m.category_id IS ? AND m.id != ? \
         ORDER BY m.downloads DESC, m.id DESC LIMIT 4"
    ))
    .bind(material.category_id)
    .bind(id)
    .fetch_all(pool)
    .await?;

    let (in_cart, is_favorite) = match viewer_id {
        Some(viewer) => {
            let (in_cart, is_favorite): (bool, bool) = sqlx::query_as(
                r#"
                SELECT
                    EXISTS(SELECT 1 FROM cart_items WHERE user_id = ? AND material_id = ?),
                    EXISTS(SELECT 1 FROM favorites WHERE user_id = ? AND material_id = ?)
                "#,
            )
            .bind(viewer)
            .bind(id)
            .bind(viewer)
            .bind(id)
            .fetch_one(pool)
            .await?;
            (in_cart, is_favorite)
        }
        None => (false, false),
    };

    Ok(MaterialDetail {
        has_preview: material.has_preview(),
        seller_username,
        category,
        tags: tags_for(pool, id).await?,
        related,
        reviews: reviews::list_for_material(pool, id).await?,
        has_purchased,
        in_cart,
        is_favorite,
        material,
    })
}

/// A listing's text fields after validation and normalization.
#[derive(Debug)]
struct Listing {
    title: String,
    description: String,
    price_cents: i64,
    original_price_cents: Option<i64>,
    category_id: Option<i64>,
    course_code: Option<String>,
    university: Option<String>,
    subject: Option<String>,
    tags: Vec<String>,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    non_blank(value).map(str::to_string)
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN || out.contains(&tag) {
            continue;
        }
        out.push(tag);
    }
    out
}

fn prepare_listing(form: &MaterialForm) -> Result<Listing, CommerceError> {
    form.validate()
        .map_err(|e| CommerceError::Validation(e.to_string()))?;

    let title = form.title.trim().to_string();
    let description = clean_html(form.description.trim());
    if title.is_empty() || description.trim().is_empty() {
        return Err(CommerceError::Validation(
            "Title and description are required".to_string(),
        ));
    }

    Ok(Listing {
        title,
        description,
        price_cents: parse_price_cents(&form.price)?,
        original_price_cents: non_blank(&form.original_price)
            .map(parse_price_cents)
            .transpose()?,
        category_id: form.category_id,
        course_code: trimmed(&form.course_code),
        university: trimmed(&form.university),
        subject: trimmed(&form.subject),
        tags: normalize_tags(&form.tags),
    })
}

fn checked_extension(upload: &Upload, allowed: &[&str]) -> Result<String, CommerceError> {
    match upload.extension() {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(ext),
        _ => Err(CommerceError::Validation(format!(
            "File type not allowed: '{}'",
            upload.file_name
        ))),
    }
}

async fn ensure_category(conn: &mut SqliteConnection, category_id: Option<i64>) -> Result<(), CommerceError> {
    if let Some(id) = category_id {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        if exists == 0 {
            return Err(CommerceError::NotFound("Category"));
        }
    }
    Ok(())
}

/// Replaces the material's tags with `tags`, creating unknown tag names.
async fn set_tags(
    conn: &mut SqliteConnection,
    material_id: i64,
    tags: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM material_tags WHERE material_id = ?")
        .bind(material_id)
        .execute(&mut *conn)
        .await?;

    for name in tags {
        sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
            .bind(name)
            .execute(&mut *conn)
            .await?;
        let tag_id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO material_tags (material_id, tag_id) VALUES (?, ?)")
            .bind(material_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_listing(
    pool: &SqlitePool,
    seller_id: i64,
    listing: &Listing,
    file_type: &str,
    file: &StoredFile,
    preview: Option<&StoredFile>,
) -> Result<Material, CommerceError> {
    let mut tx = pool.begin().await?;
    ensure_category(&mut tx, listing.category_id).await?;

    let now = Utc::now();
    let material = sqlx::query_as::<_, Material>(
        r#"
        INSERT INTO materials (
            title, description, price_cents, original_price_cents,
            file_path, file_type, file_size, preview_image,
            category_id, course_code, university, subject,
            created_at, updated_at, seller_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&listing.title)
    .bind(&listing.description)
    .bind(listing.price_cents)
    .bind(listing.original_price_cents)
    .bind(&file.name)
    .bind(file_type)
    .bind(file.size)
    .bind(preview.map(|p| p.name.as_str()))
    .bind(listing.category_id)
    .bind(&listing.course_code)
    .bind(&listing.university)
    .bind(&listing.subject)
    .bind(now)
    .bind(now)
    .bind(seller_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE users SET is_seller = 1 WHERE id = ?")
        .bind(seller_id)
        .execute(&mut *tx)
        .await?;

    set_tags(&mut tx, material.id, &listing.tags).await?;
    tx.commit().await?;

    Ok(material)
}

/// Lists a new material for sale.
///
/// Files are written first; the row referencing them is committed after.
/// If the row cannot be written the files are removed again.
pub async fn create_material(
    pool: &SqlitePool,
    files: &dyn FileStore,
    seller_id: i64,
    form: &MaterialForm,
    file: &Upload,
    preview: Option<&Upload>,
) -> Result<Material, CommerceError> {
    let listing = prepare_listing(form)?;
    let file_type = checked_extension(file, ALLOWED_EXTENSIONS)?;
    if file.bytes.is_empty() {
        return Err(CommerceError::Validation("File is empty".to_string()));
    }
    let preview_ext = preview
        .map(|p| checked_extension(p, PREVIEW_EXTENSIONS))
        .transpose()?;

    let stored = files.put("", &file_type, &file.bytes).await?;

    let stored_preview = match (preview, preview_ext) {
        (Some(p), Some(ext)) => match files.put("preview_", &ext, &p.bytes).await {
            Ok(s) => Some(s),
            Err(e) => {
                discard(files, &stored.name).await;
                return Err(e.into());
            }
        },
        _ => None,
    };

    match insert_listing(pool, seller_id, &listing, &file_type, &stored, stored_preview.as_ref()).await {
        Ok(material) => {
            tracing::info!(
                seller_id,
                material_id = material.id,
                price_cents = material.price_cents,
                "material listed"
            );
            Ok(material)
        }
        Err(e) => {
            discard(files, &stored.name).await;
            if let Some(p) = &stored_preview {
                discard(files, &p.name).await;
            }
            Err(e)
        }
    }
}

async fn discard(files: &dyn FileStore, name: &str) {
    if let Err(e) = files.delete(name).await {
        tracing::warn!("Failed to remove orphaned file {}: {:?}", name, e);
    }
}

fn ensure_can_manage(material: &Material, actor_id: i64, actor_is_admin: bool) -> Result<(), CommerceError> {
    if material.seller_id != actor_id && !actor_is_admin {
        return Err(CommerceError::AccessDenied(
            "You are not allowed to modify this material".to_string(),
        ));
    }
    Ok(())
}

/// Edits a listing's text fields. Seller or admin only.
pub async fn update_material(
    pool: &SqlitePool,
    actor_id: i64,
    actor_is_admin: bool,
    id: i64,
    form: &MaterialForm,
) -> Result<Material, CommerceError> {
    let listing = prepare_listing(form)?;

    let mut tx = pool.begin().await?;
    let current = fetch_material(&mut *tx, id).await?;
    ensure_can_manage(&current, actor_id, actor_is_admin)?;
    ensure_category(&mut tx, listing.category_id).await?;

    let material = sqlx::query_as::<_, Material>(
        r#"
        UPDATE materials
        SET title = ?, description = ?, price_cents = ?, original_price_cents = ?,
            category_id = ?, course_code = ?, university = ?, subject = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&listing.title)
    .bind(&listing.description)
    .bind(listing.price_cents)
    .bind(listing.original_price_cents)
    .bind(listing.category_id)
    .bind(&listing.course_code)
    .bind(&listing.university)
    .bind(&listing.subject)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    set_tags(&mut tx, id, &listing.tags).await?;
    tx.commit().await?;

    tracing::info!(actor_id, material_id = id, "material updated");
    Ok(material)
}

/// Soft-deletes a listing and takes it out of every cart.
pub async fn deactivate_material(
    pool: &SqlitePool,
    actor_id: i64,
    actor_is_admin: bool,
    id: i64,
) -> Result<(), CommerceError> {
    let mut tx = pool.begin().await?;
    let current = fetch_material(&mut *tx, id).await?;
    ensure_can_manage(&current, actor_id, actor_is_admin)?;

    sqlx::query("UPDATE materials SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM cart_items WHERE material_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(actor_id, material_id = id, "material deactivated");
    Ok(())
}

/// Admin placement flags. Unset fields keep their value.
pub async fn set_flags(
    pool: &SqlitePool,
    id: i64,
    flags: &MaterialFlagsRequest,
) -> Result<Material, CommerceError> {
    sqlx::query_as::<_, Material>(
        r#"
        UPDATE materials
        SET is_featured = COALESCE(?, is_featured),
            is_best_seller = COALESCE(?, is_best_seller)
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(flags.is_featured)
    .bind(flags.is_best_seller)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(CommerceError::NotFound("Material"))
}

/// Every material of a seller, newest first. `include_inactive` is for the
/// seller's own dashboard.
pub async fn materials_by_seller(
    pool: &SqlitePool,
    seller_id: i64,
    include_inactive: bool,
) -> Result<Vec<Material>, CommerceError> {
    let materials = sqlx::query_as::<_, Material>(
        r#"
        SELECT * FROM materials
        WHERE seller_id = ? AND (is_active = 1 OR ?)
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(seller_id)
    .bind(include_inactive)
    .fetch_all(pool)
    .await?;
    Ok(materials)
}

/// Public seller page.
#[derive(Debug, serde::Serialize)]
pub struct SellerProfile {
    pub seller: PublicUser,
    pub materials: Vec<Material>,
}

pub async fn seller_profile(pool: &SqlitePool, seller_id: i64) -> Result<SellerProfile, CommerceError> {
    let seller = sqlx::query_as::<_, PublicUser>(
        r#"
        SELECT id, username, first_name, last_name, university, bio, profile_image,
               is_seller, is_verified, seller_rating, created_at
        FROM users WHERE id = ?
        "#,
    )
    .bind(seller_id)
    .fetch_optional(pool)
    .await?
    .ok_or(CommerceError::NotFound("Seller"))?;

    let materials = materials_by_seller(pool, seller_id, false).await?;
    Ok(SellerProfile { seller, materials })
}

/// Location of a material's preview image and its extension.
pub async fn preview(
    pool: &SqlitePool,
    files: &dyn FileStore,
    id: i64,
) -> Result<(PathBuf, String), CommerceError> {
    let name = sqlx::query_scalar::<_, Option<String>>(
        "SELECT preview_image FROM materials WHERE id = ? AND is_active = 1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .flatten();
    let name = name.ok_or(CommerceError::NotFound("Preview"))?;

    let ext = name.rsplit_once('.').map(|(_, e)| e.to_string()).unwrap_or_default();
    let path = files.locate(&name).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CommerceError::NotFound("Preview"),
        _ => CommerceError::FileStorage(e),
    })?;
    Ok((path, ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offsets_saturate() {
        assert_eq!(page_offset(1), 0);
        assert_eq!(page_offset(3), 2 * CATALOG_PAGE_SIZE);
        assert_eq!(page_offset(i64::MAX), i64::MAX);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("cs101"), "%cs101%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn tags_are_trimmed_lowercased_deduplicated() {
        let tags = vec![
            " Exam ".to_string(),
            "exam".to_string(),
            "".to_string(),
            "Linear Algebra".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["exam", "linear algebra"]);
    }

    #[test]
    fn listing_requires_positive_price() {
        let form = MaterialForm {
            title: "Notes".to_string(),
            description: "All lectures".to_string(),
            price: "0".to_string(),
            ..MaterialForm::default()
        };
        assert!(matches!(
            prepare_listing(&form),
            Err(CommerceError::Validation(_))
        ));
    }

    #[test]
    fn listing_sanitizes_description() {
        let form = MaterialForm {
            title: "  Notes ".to_string(),
            description: "<p>ok</p><script>x()</script>".to_string(),
            price: "4.50".to_string(),
            ..MaterialForm::default()
        };
        let listing = prepare_listing(&form).unwrap();
        assert_eq!(listing.title, "Notes");
        assert_eq!(listing.description, "<p>ok</p>");
        assert_eq!(listing.price_cents, 450);
    }

    #[test]
    fn rejects_disallowed_extensions() {
        let exe = Upload {
            file_name: "setup.exe".to_string(),
            bytes: vec![1],
        };
        assert!(checked_extension(&exe, ALLOWED_EXTENSIONS).is_err());
        let pdf = Upload {
            file_name: "notes.PDF".to_string(),
            bytes: vec![1],
        };
        assert_eq!(checked_extension(&pdf, ALLOWED_EXTENSIONS).unwrap(), "pdf");
    }
}
