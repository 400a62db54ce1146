// tests/commerce_tests.rs

use chrono::Utc;
use sqlx::SqlitePool;
use studyswap::{
    db,
    error::CommerceError,
    models::{
        cart::CartAdd,
        catalog::{BrowseParams, SortOrder},
        material::{MaterialForm, Upload},
    },
    services::{
        cart, catalog,
        checkout::{self, CheckoutPolicy},
        entitlement::{self, Access},
        favorites, orders, reviews,
    },
    storage::LocalFileStore,
};

async fn setup() -> (SqlitePool, LocalFileStore) {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to open in-memory database");
    let dir = std::env::temp_dir().join(format!("studyswap-test-{}", uuid::Uuid::new_v4()));
    let files = LocalFileStore::open(dir)
        .await
        .expect("Failed to create upload dir");
    (pool, files)
}

/// A database file with a multi-connection pool, for tests that race writers.
async fn setup_on_disk() -> (SqlitePool, LocalFileStore) {
    let dir = std::env::temp_dir().join(format!("studyswap-race-{}", uuid::Uuid::new_v4()));
    let files = LocalFileStore::open(dir.join("uploads"))
        .await
        .expect("Failed to create upload dir");
    let url = format!("sqlite://{}", dir.join("studyswap.db").display());
    let pool = db::connect(&url, 4)
        .await
        .expect("Failed to open database file");
    db::MIGRATOR
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    (pool, files)
}

async fn create_user(pool: &SqlitePool, username: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, 'x', ?) RETURNING id",
    )
    .bind(username)
    .bind(format!("{}@example.com", username))
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .expect("Failed to insert user")
}

fn form(title: &str, price: &str) -> MaterialForm {
    MaterialForm {
        title: title.to_string(),
        description: format!("{} description", title),
        price: price.to_string(),
        ..MaterialForm::default()
    }
}

async fn list_material(
    pool: &SqlitePool,
    files: &LocalFileStore,
    seller_id: i64,
    form: MaterialForm,
) -> i64 {
    let file = Upload {
        file_name: "notes.pdf".to_string(),
        bytes: b"%PDF-1.4 test".to_vec(),
    };
    catalog::create_material(pool, files, seller_id, &form, &file, None)
        .await
        .expect("Failed to list material")
        .id
}

async fn buy(pool: &SqlitePool, buyer_id: i64, material_id: i64) {
    cart::add(pool, buyer_id, material_id)
        .await
        .expect("Failed to add to cart");
    checkout::checkout(pool, buyer_id, &CheckoutPolicy::default())
        .await
        .expect("Checkout failed");
}

async fn earnings(pool: &SqlitePool, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT total_earnings_cents FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn order_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn seller_cannot_add_own_material() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;

    let result = cart::add(&pool, seller, material).await;

    assert!(matches!(result, Err(CommerceError::SelfPurchase)));
    assert_eq!(cart::count(&pool, seller).await.unwrap(), 0);
}

#[tokio::test]
async fn adding_twice_keeps_one_line() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let buyer = create_user(&pool, "bob").await;
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;

    assert_eq!(cart::add(&pool, buyer, material).await.unwrap(), CartAdd::Added);
    assert_eq!(
        cart::add(&pool, buyer, material).await.unwrap(),
        CartAdd::AlreadyPresent
    );

    let view = cart::view(&pool, buyer).await.unwrap();
    assert_eq!(view.count, 1);
    assert_eq!(view.total_cents, 1000);
    assert_eq!(view.items[0].seller_username, "alice");
    assert_eq!(cart::total(&pool, buyer).await.unwrap(), 1000);

    assert!(cart::remove(&pool, buyer, material).await.unwrap());
    assert!(!cart::remove(&pool, buyer, material).await.unwrap());
    assert_eq!(cart::total(&pool, buyer).await.unwrap(), 0);
}

#[tokio::test]
async fn missing_or_inactive_material_cannot_be_added() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let buyer = create_user(&pool, "bob").await;
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;
    catalog::deactivate_material(&pool, seller, false, material)
        .await
        .unwrap();

    assert!(matches!(
        cart::add(&pool, buyer, material).await,
        Err(CommerceError::NotFound(_))
    ));
    assert!(matches!(
        cart::add(&pool, buyer, 9999).await,
        Err(CommerceError::NotFound(_))
    ));
}

#[tokio::test]
async fn checkout_with_empty_cart_creates_nothing() {
    let (pool, _files) = setup().await;
    let buyer = create_user(&pool, "bob").await;

    let result = checkout::checkout(&pool, buyer, &CheckoutPolicy::default()).await;

    assert!(matches!(result, Err(CommerceError::EmptyCart)));
    assert_eq!(order_count(&pool).await, 0);
}

#[tokio::test]
async fn buyer_pays_seller_earns_share() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let buyer = create_user(&pool, "bob").await;
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;

    cart::add(&pool, buyer, material).await.unwrap();
    let receipt = checkout::checkout(&pool, buyer, &CheckoutPolicy::default())
        .await
        .unwrap();

    assert_eq!(receipt.total_amount_cents, 1000);
    assert_eq!(receipt.item_count, 1);
    assert!(receipt.order_number.starts_with("SS-"));

    assert_eq!(cart::count(&pool, buyer).await.unwrap(), 0);
    assert_eq!(earnings(&pool, seller).await, 800);
    assert!(entitlement::has_purchased(&pool, buyer, material).await.unwrap());

    let downloads: i64 = sqlx::query_scalar("SELECT downloads FROM materials WHERE id = ?")
        .bind(material)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(downloads, 1);

    let detail = orders::detail(&pool, buyer, receipt.order_id, false)
        .await
        .unwrap();
    assert_eq!(detail.order.payment_method.as_deref(), Some("card"));
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].price_cents, 1000);

    // A second checkout finds nothing left to buy.
    assert!(matches!(
        checkout::checkout(&pool, buyer, &CheckoutPolicy::default()).await,
        Err(CommerceError::EmptyCart)
    ));
}

#[tokio::test]
async fn order_total_is_sum_of_items_across_sellers() {
    let (pool, files) = setup().await;
    let alice = create_user(&pool, "alice").await;
    let carol = create_user(&pool, "carol").await;
    let buyer = create_user(&pool, "bob").await;
    let m1 = list_material(&pool, &files, alice, form("Algebra", "10.00")).await;
    let m2 = list_material(&pool, &files, carol, form("Biology", "4.99")).await;

    cart::add(&pool, buyer, m1).await.unwrap();
    cart::add(&pool, buyer, m2).await.unwrap();
    let receipt = checkout::checkout(&pool, buyer, &CheckoutPolicy::default())
        .await
        .unwrap();

    let items_sum: i64 =
        sqlx::query_scalar("SELECT SUM(price_cents) FROM order_items WHERE order_id = ?")
            .bind(receipt.order_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(receipt.total_amount_cents, 1499);
    assert_eq!(items_sum, receipt.total_amount_cents);
    assert_eq!(earnings(&pool, alice).await, 800);
    assert_eq!(earnings(&pool, carol).await, 399);
}

#[tokio::test]
async fn failed_checkout_leaves_no_trace() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let buyer = create_user(&pool, "bob").await;
    let m1 = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;
    let m2 = list_material(&pool, &files, seller, form("Calculus", "5.00")).await;
    cart::add(&pool, buyer, m1).await.unwrap();
    cart::add(&pool, buyer, m2).await.unwrap();

    // Fail the second item insert, after the first line was fully written.
    sqlx::query(&format!(
        "CREATE TRIGGER fail_item BEFORE INSERT ON order_items WHEN NEW.material_id = {m2} \
         BEGIN SELECT RAISE(ABORT, 'forced failure'); END"
    ))
    .execute(&pool)
    .await
    .unwrap();

    let result = checkout::checkout(&pool, buyer, &CheckoutPolicy::default()).await;

    assert!(matches!(result, Err(CommerceError::Storage(_))));
    assert_eq!(order_count(&pool).await, 0);
    assert_eq!(cart::count(&pool, buyer).await.unwrap(), 2);
    assert_eq!(earnings(&pool, seller).await, 0);
    let downloads: i64 = sqlx::query_scalar("SELECT SUM(downloads) FROM materials")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(downloads, 0);
}

#[tokio::test]
async fn earnings_cannot_decrease() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let buyer = create_user(&pool, "bob").await;
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;
    buy(&pool, buyer, material).await;

    let result = sqlx::query("UPDATE users SET total_earnings_cents = 0 WHERE id = ?")
        .bind(seller)
        .execute(&pool)
        .await;

    assert!(result.is_err());
    assert_eq!(earnings(&pool, seller).await, 800);
}

#[tokio::test]
async fn orders_are_private_to_buyer() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let buyer = create_user(&pool, "bob").await;
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;
    buy(&pool, buyer, material).await;
    let order_id = orders::list_for_buyer(&pool, buyer).await.unwrap()[0].id;

    assert!(matches!(
        orders::detail(&pool, seller, order_id, false).await,
        Err(CommerceError::AccessDenied(_))
    ));
    assert!(orders::detail(&pool, seller, order_id, true).await.is_ok());
    assert!(matches!(
        orders::detail(&pool, buyer, 9999, false).await,
        Err(CommerceError::NotFound(_))
    ));
}

#[tokio::test]
async fn download_requires_purchase_or_ownership() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let buyer = create_user(&pool, "bob").await;
    let stranger = create_user(&pool, "eve").await;
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;
    buy(&pool, buyer, material).await;

    assert!(matches!(
        entitlement::authorize_download(&pool, stranger, material).await,
        Err(CommerceError::AccessDenied(_))
    ));

    let owner_grant = entitlement::authorize_download(&pool, seller, material)
        .await
        .unwrap();
    assert_eq!(owner_grant.access, Access::Owner);
    assert_eq!(owner_grant.filename, "Algebra.pdf");

    let grant = entitlement::authorize_download(&pool, buyer, material)
        .await
        .unwrap();
    assert!(matches!(grant.access, Access::Purchased { .. }));

    let (count, last): (i64, Option<chrono::DateTime<Utc>>) = sqlx::query_as(
        "SELECT download_count, last_download FROM order_items WHERE material_id = ?",
    )
    .bind(material)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
    assert!(last.is_some());
}

#[tokio::test]
async fn deactivation_empties_carts_but_keeps_buyer_access() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let buyer = create_user(&pool, "bob").await;
    let other = create_user(&pool, "carol").await;
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;
    buy(&pool, buyer, material).await;
    cart::add(&pool, other, material).await.unwrap();

    assert!(matches!(
        catalog::deactivate_material(&pool, other, false, material).await,
        Err(CommerceError::AccessDenied(_))
    ));
    catalog::deactivate_material(&pool, seller, false, material)
        .await
        .unwrap();

    assert_eq!(cart::count(&pool, other).await.unwrap(), 0);
    assert!(entitlement::has_access(&pool, buyer, material).await.unwrap());
    assert!(catalog::material_detail(&pool, material, Some(buyer)).await.is_ok());
    assert!(matches!(
        catalog::material_detail(&pool, material, None).await,
        Err(CommerceError::NotFound(_))
    ));
}

#[tokio::test]
async fn only_buyers_may_review() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let stranger = create_user(&pool, "eve").await;
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;

    assert!(matches!(
        reviews::add_review(&pool, stranger, material, 5, None).await,
        Err(CommerceError::NotEntitled)
    ));
    // Entitlement is checked before the rating.
    assert!(matches!(
        reviews::add_review(&pool, stranger, material, 9, None).await,
        Err(CommerceError::NotEntitled)
    ));
    // Owning the material is not a purchase.
    assert!(matches!(
        reviews::add_review(&pool, seller, material, 5, None).await,
        Err(CommerceError::NotEntitled)
    ));
    assert!(matches!(
        reviews::add_review(&pool, stranger, 9999, 5, None).await,
        Err(CommerceError::NotFound(_))
    ));
}

#[tokio::test]
async fn ratings_aggregate_over_all_reviews() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let bob = create_user(&pool, "bob").await;
    let carol = create_user(&pool, "carol").await;
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;
    buy(&pool, bob, material).await;
    buy(&pool, carol, material).await;

    assert!(matches!(
        reviews::add_review(&pool, bob, material, 0, None).await,
        Err(CommerceError::InvalidRating(0))
    ));

    let first = reviews::add_review(&pool, bob, material, 5, Some("  <b>Great</b> notes "))
        .await
        .unwrap();
    assert_eq!(first.comment.as_deref(), Some("<b>Great</b> notes"));
    reviews::add_review(&pool, carol, material, 2, None)
        .await
        .unwrap();

    assert!(matches!(
        reviews::add_review(&pool, bob, material, 4, None).await,
        Err(CommerceError::DuplicateReview)
    ));

    let (rating, count): (f64, i64) =
        sqlx::query_as("SELECT rating, rating_count FROM materials WHERE id = ?")
            .bind(material)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!((rating - 3.5).abs() < 1e-9);
    assert_eq!(count, 2);

    reviews::update_review(&pool, bob, first.id, 4, None)
        .await
        .unwrap();
    let seller_rating: f64 = sqlx::query_scalar("SELECT seller_rating FROM users WHERE id = ?")
        .bind(seller)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!((seller_rating - 3.0).abs() < 1e-9);

    assert!(matches!(
        reviews::update_review(&pool, carol, first.id, 1, None).await,
        Err(CommerceError::AccessDenied(_))
    ));
    assert_eq!(reviews::mark_helpful(&pool, first.id).await.unwrap(), 1);
    assert_eq!(reviews::list_for_material(&pool, material).await.unwrap().len(), 2);
}

#[tokio::test]
async fn browse_filters_and_sorts() {
    let (pool, files) = setup().await;
    db::seed_categories(&pool).await.unwrap();
    let programming: i64 = sqlx::query_scalar("SELECT id FROM categories WHERE slug = 'programming'")
        .fetch_one(&pool)
        .await
        .unwrap();
    let seller = create_user(&pool, "alice").await;

    let mut rust = form("Rust basics", "12.00");
    rust.category_id = Some(programming);
    rust.course_code = Some("CS101".to_string());
    list_material(&pool, &files, seller, rust).await;
    list_material(&pool, &files, seller, form("Algebra", "3.00")).await;
    list_material(&pool, &files, seller, form("Poetry", "7.50")).await;

    let cheap_first = catalog::browse(
        &pool,
        &BrowseParams {
            sort: SortOrder::PriceLow,
            ..BrowseParams::default()
        },
    )
    .await
    .unwrap();
    let prices: Vec<i64> = cheap_first.items.iter().map(|m| m.price_cents).collect();
    assert_eq!(prices, vec![300, 750, 1200]);
    assert_eq!(cheap_first.total, 3);

    let in_range = catalog::browse(
        &pool,
        &BrowseParams {
            min_price: Some("5".to_string()),
            max_price: Some("10.00".to_string()),
            ..BrowseParams::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(in_range.total, 1);
    assert_eq!(in_range.items[0].title, "Poetry");

    let by_category = catalog::category_page(&pool, "programming", None)
        .await
        .unwrap();
    assert_eq!(by_category.materials.total, 1);
    assert!(matches!(
        catalog::category_page(&pool, "nope", None).await,
        Err(CommerceError::NotFound(_))
    ));

    let hits = catalog::quick_search(&pool, "cs1").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].category.as_deref(), Some("Programming"));
    assert!(catalog::quick_search(&pool, "c").await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_marks_seller_and_stores_tags() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let mut listing = form("Algebra", "10.00");
    listing.tags = vec!["Exam".to_string(), "exam".to_string(), "Linear".to_string()];
    let material = list_material(&pool, &files, seller, listing).await;

    let is_seller: bool = sqlx::query_scalar("SELECT is_seller FROM users WHERE id = ?")
        .bind(seller)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(is_seller);

    let detail = catalog::material_detail(&pool, material, None).await.unwrap();
    let tags: Vec<&str> = detail.tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tags, vec!["exam", "linear"]);
    assert_eq!(detail.material.views, 1);
    assert_eq!(detail.seller_username, "alice");
    assert!(!detail.has_purchased);
}

#[tokio::test]
async fn rejected_listing_writes_nothing() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let exe = Upload {
        file_name: "setup.exe".to_string(),
        bytes: vec![1, 2, 3],
    };

    let result =
        catalog::create_material(&pool, &files, seller, &form("Algebra", "10.00"), &exe, None)
            .await;
    assert!(matches!(result, Err(CommerceError::Validation(_))));

    let pdf = Upload {
        file_name: "notes.pdf".to_string(),
        bytes: vec![1, 2, 3],
    };
    let mut bad_category = form("Algebra", "10.00");
    bad_category.category_id = Some(4242);
    let result =
        catalog::create_material(&pool, &files, seller, &bad_category, &pdf, None).await;
    assert!(matches!(result, Err(CommerceError::NotFound(_))));

    let materials: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM materials")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(materials, 0);
    let leftover = std::fs::read_dir(files.root()).unwrap().count();
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn favorites_toggle() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let buyer = create_user(&pool, "bob").await;
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;

    assert!(favorites::toggle(&pool, buyer, material).await.unwrap());
    assert_eq!(favorites::list(&pool, buyer).await.unwrap().len(), 1);
    assert!(!favorites::toggle(&pool, buyer, material).await.unwrap());
    assert!(favorites::list(&pool, buyer).await.unwrap().is_empty());
    assert!(matches!(
        favorites::toggle(&pool, buyer, 9999).await,
        Err(CommerceError::NotFound(_))
    ));
}

#[tokio::test]
async fn owner_edits_listing_and_admin_features_it() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let other = create_user(&pool, "eve").await;
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;

    let mut edit = form("Algebra II", "12.00");
    edit.tags = vec!["Finals".to_string()];
    assert!(matches!(
        catalog::update_material(&pool, other, false, material, &edit).await,
        Err(CommerceError::AccessDenied(_))
    ));

    let updated = catalog::update_material(&pool, seller, false, material, &edit)
        .await
        .unwrap();
    assert_eq!(updated.title, "Algebra II");
    assert_eq!(updated.price_cents, 1200);
    let tags = catalog::tags_for(&pool, material).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "finals");

    let flags = studyswap::models::material::MaterialFlagsRequest {
        is_featured: Some(true),
        is_best_seller: None,
    };
    let flagged = catalog::set_flags(&pool, material, &flags).await.unwrap();
    assert!(flagged.is_featured);
    assert!(!flagged.is_best_seller);

    let home = catalog::home(&pool).await.unwrap();
    assert_eq!(home.featured.len(), 1);
    assert_eq!(home.total_materials, 1);
    assert_eq!(home.total_sellers, 1);
}

#[tokio::test]
async fn oversized_prices_are_refused() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    let buyer = create_user(&pool, "bob").await;

    let file = Upload {
        file_name: "notes.pdf".to_string(),
        bytes: b"%PDF-1.4 test".to_vec(),
    };
    assert!(matches!(
        catalog::create_material(&pool, &files, seller, &form("Huge", "9999999999999999"), &file, None)
            .await,
        Err(CommerceError::Validation(_))
    ));

    // A price that got into the table some other way still cannot wrap.
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;
    sqlx::query("UPDATE materials SET price_cents = ? WHERE id = ?")
        .bind(999_999_999_999_999_900_i64)
        .bind(material)
        .execute(&pool)
        .await
        .unwrap();
    cart::add(&pool, buyer, material).await.unwrap();

    let result = checkout::checkout(&pool, buyer, &CheckoutPolicy::default()).await;

    assert!(matches!(result, Err(CommerceError::Validation(_))));
    assert_eq!(order_count(&pool).await, 0);
    assert_eq!(cart::count(&pool, buyer).await.unwrap(), 1);
    assert_eq!(earnings(&pool, seller).await, 0);
}

#[tokio::test]
async fn far_pages_are_empty() {
    let (pool, files) = setup().await;
    let seller = create_user(&pool, "alice").await;
    list_material(&pool, &files, seller, form("Algebra", "10.00")).await;

    let page = catalog::browse(
        &pool,
        &BrowseParams {
            page: Some(i64::MAX),
            ..BrowseParams::default()
        },
    )
    .await
    .unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_checkouts_buy_the_cart_once() {
    let (pool, files) = setup_on_disk().await;
    let seller = create_user(&pool, "alice").await;
    let buyer = create_user(&pool, "bob").await;
    let m1 = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;
    let m2 = list_material(&pool, &files, seller, form("Calculus", "5.00")).await;
    cart::add(&pool, buyer, m1).await.unwrap();
    cart::add(&pool, buyer, m2).await.unwrap();

    let policy = CheckoutPolicy::default();
    let (a, b) = tokio::join!(
        checkout::checkout(&pool, buyer, &policy),
        checkout::checkout(&pool, buyer, &policy)
    );

    let receipts: Vec<_> = [a, b]
        .into_iter()
        .filter_map(|result| match result {
            Ok(receipt) => Some(receipt),
            Err(CommerceError::EmptyCart) => None,
            Err(other) => panic!("unexpected checkout error: {other:?}"),
        })
        .collect();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].item_count, 2);
    assert_eq!(order_count(&pool).await, 1);
    assert_eq!(earnings(&pool, seller).await, 1200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_reviews_keep_one_per_buyer() {
    let (pool, files) = setup_on_disk().await;
    let seller = create_user(&pool, "alice").await;
    let buyer = create_user(&pool, "bob").await;
    let material = list_material(&pool, &files, seller, form("Algebra", "10.00")).await;
    buy(&pool, buyer, material).await;

    let (a, b) = tokio::join!(
        reviews::add_review(&pool, buyer, material, 5, None),
        reviews::add_review(&pool, buyer, material, 3, None)
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(CommerceError::DuplicateReview)))
            .count(),
        1
    );

    let count: i64 = sqlx::query_scalar("SELECT rating_count FROM materials WHERE id = ?")
        .bind(material)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
