//! Reviews and the rating aggregates derived from them.
//!
//! Every write to `reviews` recomputes `materials.rating`/`rating_count` and
//! the seller's `seller_rating` from the full review set, inside the same
//! transaction as the write.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{CommerceError, is_unique_violation};
use crate::models::review::{Review, ReviewView};
use crate::services::entitlement::{self, Access, MaterialRef};
use crate::utils::html::clean_optional;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;
pub const MAX_COMMENT_CHARS: usize = 2000;

fn check_rating(rating: i64) -> Result<(), CommerceError> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(CommerceError::InvalidRating(rating))
    }
}

fn prepare_comment(comment: Option<&str>) -> Result<Option<String>, CommerceError> {
    let comment = clean_optional(comment);
    if comment
        .as_ref()
        .is_some_and(|c| c.chars().count() > MAX_COMMENT_CHARS)
    {
        return Err(CommerceError::Validation(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(comment)
}

/// Recomputes the material's mean rating and count, then the seller's mean
/// over all reviews they received.
pub(crate) async fn refresh_aggregates(
    conn: &mut SqliteConnection,
    material_id: i64,
    seller_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE materials
        SET rating = COALESCE((SELECT AVG(rating) FROM reviews WHERE material_id = ?), 0),
            rating_count = (SELECT COUNT(*) FROM reviews WHERE material_id = ?)
        WHERE id = ?
        "#,
    )
    .bind(material_id)
    .bind(material_id)
    .bind(material_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        UPDATE users
        SET seller_rating = COALESCE((SELECT AVG(rating) FROM reviews WHERE seller_id = ?), 0)
        WHERE id = ?
        "#,
    )
    .bind(seller_id)
    .bind(seller_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Adds the user's review of a material they bought.
///
/// Checks run in order: material exists, purchase, no earlier review,
/// rating range.
pub async fn add_review(
    pool: &SqlitePool,
    user_id: i64,
    material_id: i64,
    rating: i64,
    comment: Option<&str>,
) -> Result<Review, CommerceError> {
    let material = entitlement::material_ref(pool, material_id).await?;

    // Seller ownership grants downloads, not reviews.
    match entitlement::access(pool, user_id, material).await? {
        Some(Access::Purchased { .. }) => {}
        _ => return Err(CommerceError::NotEntitled),
    }

    let existing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE material_id = ? AND reviewer_id = ?")
            .bind(material_id)
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    if existing > 0 {
        return Err(CommerceError::DuplicateReview);
    }

    check_rating(rating)?;
    let comment = prepare_comment(comment)?;

    // The unique index settles races the pre-check above cannot.
    let review = insert_review(pool, user_id, material, rating, comment.as_deref()).await?;

    tracing::info!(user_id, material_id, rating, "review added");
    Ok(review)
}

/// Writes a validated review and refreshes the aggregates.
///
/// The INSERT opens the transaction, so a duplicate surfaces as a unique
/// violation here rather than as a lost lock upgrade.
async fn insert_review(
    pool: &SqlitePool,
    user_id: i64,
    material: MaterialRef,
    rating: i64,
    comment: Option<&str>,
) -> Result<Review, CommerceError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let review = sqlx::query_as::<_, Review>(
        r#"
        INSERT INTO reviews (rating, comment, created_at, updated_at, material_id, reviewer_id, seller_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id, rating, comment, created_at, updated_at, material_id, reviewer_id, seller_id, helpful_count
        "#,
    )
    .bind(rating)
    .bind(comment)
    .bind(now)
    .bind(now)
    .bind(material.id)
    .bind(user_id)
    .bind(material.seller_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            CommerceError::DuplicateReview
        } else {
            CommerceError::from(e)
        }
    })?;

    refresh_aggregates(&mut tx, material.id, material.seller_id).await?;
    tx.commit().await?;

    Ok(review)
}

/// Edits the caller's own review and recomputes the aggregates.
pub async fn update_review(
    pool: &SqlitePool,
    user_id: i64,
    review_id: i64,
    rating: i64,
    comment: Option<&str>,
) -> Result<Review, CommerceError> {
    let reviewer_id: i64 = sqlx::query_scalar("SELECT reviewer_id FROM reviews WHERE id = ?")
        .bind(review_id)
        .fetch_optional(pool)
        .await?
        .ok_or(CommerceError::NotFound("Review"))?;

    if reviewer_id != user_id {
        return Err(CommerceError::AccessDenied(
            "You can only edit your own review".to_string(),
        ));
    }
    check_rating(rating)?;
    let comment = prepare_comment(comment)?;

    let mut tx = pool.begin().await?;

    // Write first so the transaction holds the write lock from its first
    // statement. Authorship is rechecked in the WHERE clause.
    let review = sqlx::query_as::<_, Review>(
        r#"
        UPDATE reviews
        SET rating = ?, comment = ?, updated_at = ?
        WHERE id = ? AND reviewer_id = ?
        RETURNING id, rating, comment, created_at, updated_at, material_id, reviewer_id, seller_id, helpful_count
        "#,
    )
    .bind(rating)
    .bind(&comment)
    .bind(Utc::now())
    .bind(review_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(CommerceError::NotFound("Review"))?;

    refresh_aggregates(&mut tx, review.material_id, review.seller_id).await?;
    tx.commit().await?;

    tracing::info!(user_id, review_id, rating, "review updated");
    Ok(review)
}

/// Reviews of a material with author names, newest first.
pub async fn list_for_material(
    pool: &SqlitePool,
    material_id: i64,
) -> Result<Vec<ReviewView>, CommerceError> {
    let reviews = sqlx::query_as::<_, ReviewView>(
        r#"
        SELECT
            r.id, r.rating, r.comment, r.reviewer_id, u.username AS reviewer_username,
            r.helpful_count, r.created_at, r.updated_at
        FROM reviews r
        JOIN users u ON u.id = r.reviewer_id
        WHERE r.material_id = ?
        ORDER BY r.created_at DESC, r.id DESC
        "#,
    )
    .bind(material_id)
    .fetch_all(pool)
    .await?;

    Ok(reviews)
}

/// Bumps a review's helpful counter and returns the new value.
pub async fn mark_helpful(pool: &SqlitePool, review_id: i64) -> Result<i64, CommerceError> {
    sqlx::query_scalar::<_, i64>(
        "UPDATE reviews SET helpful_count = helpful_count + 1 WHERE id = ? RETURNING helpful_count",
    )
    .bind(review_id)
    .fetch_optional(pool)
    .await?
    .ok_or(CommerceError::NotFound("Review"))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn user(pool: &SqlitePool, name: &str) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, 'x', ?) RETURNING id",
        )
        .bind(name)
        .bind(format!("{}@example.com", name))
        .bind(Utc::now())
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn unique_index_turns_second_insert_into_duplicate() {
        let pool = crate::db::connect_in_memory().await.unwrap();
        let seller = user(&pool, "alice").await;
        let buyer = user(&pool, "bob").await;
        let material_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO materials (title, description, price_cents, file_path, file_type, file_size,
                                   created_at, updated_at, seller_id)
            VALUES ('Algebra', 'Notes', 1000, 'a.pdf', 'pdf', 1, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(Utc::now())
        .bind(Utc::now())
        .bind(seller)
        .fetch_one(&pool)
        .await
        .unwrap();
        let material = MaterialRef {
            id: material_id,
            seller_id: seller,
        };

        // A row written between the pre-check and the insert
        insert_review(&pool, buyer, material, 5, None).await.unwrap();

        let second = insert_review(&pool, buyer, material, 1, Some("again")).await;
        assert!(matches!(second, Err(CommerceError::DuplicateReview)));

        let (rating, count): (f64, i64) =
            sqlx::query_as("SELECT rating, rating_count FROM materials WHERE id = ?")
                .bind(material_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
        assert!((rating - 5.0).abs() < 1e-9);
    }

    #[test]
    fn rating_bounds() {
        assert!(check_rating(1).is_ok());
        assert!(check_rating(5).is_ok());
        assert!(matches!(check_rating(0), Err(CommerceError::InvalidRating(0))));
        assert!(matches!(check_rating(6), Err(CommerceError::InvalidRating(6))));
    }

    #[test]
    fn comments_are_cleaned_and_bounded() {
        assert_eq!(prepare_comment(Some("   ")).unwrap(), None);
        assert_eq!(
            prepare_comment(Some(" nice <script>x</script>")).unwrap().as_deref(),
            Some("nice ")
        );
        let long = "a".repeat(MAX_COMMENT_CHARS + 1);
        assert!(matches!(
            prepare_comment(Some(&long)),
            Err(CommerceError::Validation(_))
        ));
    }
}
