//! Integration tests for users and the generic query surface.

mod common;

use common::{seed_user, setup};
use invoicely_db::entities::users;
use invoicely_db::repositories::{CreateUserInput, UpdateUserInput};
use invoicely_db::{DalError, FieldFilter, FindManyArgs, NullsOrder, QueryMode, SortOrder};
use invoicely_shared::types::PageRequest;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

#[tokio::test]
async fn test_user_create_and_find() {
    let dal = setup().await;

    let user = dal
        .users
        .create(CreateUserInput {
            email: "  Ana@Example.COM ".to_string(),
            username: "ana".to_string(),
            password_hash: "$argon2id$test_hash".to_string(),
        })
        .await
        .expect("Failed to create user");

    assert_eq!(user.email, "ana@example.com");
    assert!(user.created_at.is_some());
    assert!(user.deleted_at.is_none());

    let found = dal.users.find_unique(user.user_id).await.unwrap();
    assert_eq!(found, user);

    let by_email = dal.users.find_by_email("ANA@example.com").await.unwrap();
    assert_eq!(by_email.map(|u| u.user_id), Some(user.user_id));

    let by_username = dal.users.find_by_username("ana").await.unwrap();
    assert_eq!(by_username.map(|u| u.user_id), Some(user.user_id));
}

#[tokio::test]
async fn test_user_find_unique_missing_is_not_found() {
    let dal = setup().await;

    let err = dal.users.find_unique(Uuid::now_v7()).await.unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert!(err.to_string().starts_with("user not found"));
}

#[tokio::test]
async fn test_duplicate_email_is_constraint_violation() {
    let dal = setup().await;
    seed_user(&dal, "ana").await;

    let err = dal
        .users
        .create(CreateUserInput {
            email: "ANA@example.com".to_string(),
            username: "ana2".to_string(),
            password_hash: "$argon2id$test_hash".to_string(),
        })
        .await
        .unwrap_err();

    assert!(err.is_constraint_violation(), "{err}");
    assert_eq!(dal.users.count(&FindManyArgs::new()).await.unwrap(), 1);
    assert!(dal.users.find_by_username("ana2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_email_is_validation_error() {
    let dal = setup().await;

    let err = dal
        .users
        .create(CreateUserInput {
            email: "not-an-email".to_string(),
            username: "ana".to_string(),
            password_hash: "hash".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DalError::Validation(_)));
    assert_eq!(dal.users.count(&FindManyArgs::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_user() {
    let dal = setup().await;
    let user = seed_user(&dal, "ana").await;

    let updated = dal
        .users
        .update(
            user.user_id,
            UpdateUserInput {
                username: Some("ana.maria".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.username, "ana.maria");
    assert_eq!(updated.email, user.email);
    assert!(updated.updated_at >= user.updated_at);
}

#[tokio::test]
async fn test_update_to_taken_username_rolls_back() {
    let dal = setup().await;
    let ana = seed_user(&dal, "ana").await;
    seed_user(&dal, "bob").await;

    let err = dal
        .users
        .update(
            ana.user_id,
            UpdateUserInput {
                email: Some("ana.new@example.com".to_string()),
                username: Some("bob".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(err.is_constraint_violation(), "{err}");
    let reloaded = dal.users.find_unique(ana.user_id).await.unwrap();
    assert_eq!(reloaded.email, "ana@example.com");
}

#[tokio::test]
async fn test_soft_delete_hides_user_until_restored() {
    let dal = setup().await;
    let ana = seed_user(&dal, "ana").await;
    seed_user(&dal, "bob").await;

    let deleted = dal.users.soft_delete(ana.user_id).await.unwrap();
    assert!(deleted.deleted_at.is_some());

    assert!(dal.users.find_unique(ana.user_id).await.unwrap_err().is_not_found());
    assert!(dal.users.find_by_email("ana@example.com").await.unwrap().is_none());
    assert_eq!(dal.users.count(&FindManyArgs::new()).await.unwrap(), 1);

    let all = FindManyArgs::new().include_deleted(true);
    assert_eq!(dal.users.count(&all).await.unwrap(), 2);
    assert!(
        dal.users
            .find_optional(ana.user_id, true)
            .await
            .unwrap()
            .is_some()
    );
    assert!(dal.users.email_exists("ana@example.com").await.unwrap());

    // A second delete finds no live row.
    assert!(dal.users.soft_delete(ana.user_id).await.unwrap_err().is_not_found());

    let restored = dal.users.restore(ana.user_id).await.unwrap();
    assert!(restored.deleted_at.is_none());
    assert_eq!(dal.users.count(&FindManyArgs::new()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_insensitive_contains_filter() {
    let dal = setup().await;
    seed_user(&dal, "alpha").await;
    seed_user(&dal, "Alphonse").await;
    seed_user(&dal, "bravo").await;

    let args = FindManyArgs::<users::Entity>::new()
        .where_field("username", FieldFilter::contains_insensitive("ALPH"))
        .unwrap()
        .order_by(users::Column::Username, SortOrder::Asc);
    let found = dal.users.find_many(&args).await.unwrap();

    let names: Vec<_> = found.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, ["Alphonse", "alpha"]);

    let args = FindManyArgs::<users::Entity>::new().filter(
        users::Column::Username,
        FieldFilter::ends_with("VO", QueryMode::Insensitive),
    );
    assert_eq!(dal.users.count(&args).await.unwrap(), 1);
}

#[tokio::test]
async fn test_string_filters_match_wildcards_literally() {
    let dal = setup().await;
    seed_user(&dal, "ann_b").await;
    seed_user(&dal, "annxb").await;

    for mode in [QueryMode::Default, QueryMode::Insensitive] {
        let args = FindManyArgs::<users::Entity>::new()
            .filter(users::Column::Username, FieldFilter::Contains("ann_b".into(), mode));
        let found = dal.users.find_many(&args).await.unwrap();
        let names: Vec<_> = found.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["ann_b"], "{mode:?}");
    }

    let args = FindManyArgs::<users::Entity>::new().filter(
        users::Column::Username,
        FieldFilter::starts_with("ann_", QueryMode::Default),
    );
    assert_eq!(dal.users.count(&args).await.unwrap(), 1);

    let args = FindManyArgs::<users::Entity>::new()
        .filter(users::Column::Email, FieldFilter::contains("%"));
    assert_eq!(dal.users.count(&args).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_field_is_validation_error() {
    let dal = setup().await;
    seed_user(&dal, "ana").await;

    let err = FindManyArgs::<users::Entity>::new()
        .where_field("nickname", FieldFilter::equals("ana"))
        .unwrap_err();
    assert!(matches!(err, DalError::Validation(_)));

    let err = FindManyArgs::<users::Entity>::new()
        .order_by_field("age", SortOrder::Desc, None)
        .unwrap_err();
    assert!(matches!(err, DalError::Validation(_)));
}

#[tokio::test]
async fn test_created_at_desc_places_nulls_last() {
    let dal = setup().await;
    seed_user(&dal, "ana").await;

    // Rows written outside the repositories may lack timestamps.
    let legacy_id = Uuid::now_v7();
    users::ActiveModel {
        user_id: Set(legacy_id),
        email: Set("legacy@example.com".to_string()),
        username: Set("legacy".to_string()),
        password_hash: Set("hash".to_string()),
        created_at: Set(None),
        updated_at: Set(None),
        deleted_at: Set(None),
    }
    .insert(dal.store().connection())
    .await
    .unwrap();

    seed_user(&dal, "bob").await;

    let args = FindManyArgs::<users::Entity>::new()
        .order_by_field("created_at", SortOrder::Desc, Some(NullsOrder::Last))
        .unwrap();
    let found = dal.users.find_many(&args).await.unwrap();
    assert_eq!(found.len(), 3);
    assert_eq!(found[2].user_id, legacy_id);
    assert!(found[..2].iter().all(|u| u.created_at.is_some()));

    let args = FindManyArgs::<users::Entity>::new().order_by_nulls(
        users::Column::CreatedAt,
        SortOrder::Asc,
        NullsOrder::First,
    );
    let found = dal.users.find_many(&args).await.unwrap();
    assert_eq!(found[0].user_id, legacy_id);
}

#[tokio::test]
async fn test_skip_take_and_pages() {
    let dal = setup().await;
    for name in ["ana", "bob", "cid", "dee", "eve"] {
        seed_user(&dal, name).await;
    }

    let args = FindManyArgs::<users::Entity>::new()
        .order_by(users::Column::Username, SortOrder::Asc)
        .skip(1)
        .take(2);
    let names: Vec<_> = dal
        .users
        .find_many(&args)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect();
    assert_eq!(names, ["bob", "cid"]);

    let args = FindManyArgs::<users::Entity>::new()
        .order_by(users::Column::Username, SortOrder::Asc)
        .skip(3);
    assert_eq!(dal.users.find_many(&args).await.unwrap().len(), 2);

    let ordered =
        FindManyArgs::<users::Entity>::new().order_by(users::Column::Username, SortOrder::Desc);
    let page = dal
        .users
        .find_page(&ordered, PageRequest::new(3, 2))
        .await
        .unwrap();
    assert_eq!(page.meta.total, 5);
    assert_eq!(page.meta.total_pages, 3);
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].username, "ana");
}

#[tokio::test]
async fn test_find_with_profile() {
    let dal = setup().await;
    let user = seed_user(&dal, "ana").await;

    let loaded = dal.users.find_with_profile(user.user_id).await.unwrap();
    assert!(loaded.profile.is_none());

    let profile = common::seed_profile(&dal, user.user_id).await;
    let loaded = dal.users.find_with_profile(user.user_id).await.unwrap();
    assert_eq!(loaded.profile.map(|p| p.profile_id), Some(profile.profile_id));
}
