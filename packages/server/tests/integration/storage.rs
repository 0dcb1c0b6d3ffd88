use crate::common::{DEFAULT_MAX_BYTES, TestApp, UploadFields, routes};

mod detail {
    use super::*;

    #[tokio::test]
    async fn owner_sees_usage_and_files_in_path_order() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let owner = app.user_id("alice").await;
        app.upload(&token, "z.txt", b"zz").await;
        let res = app
            .upload_with_token(
                "b.txt",
                b"bbb".to_vec(),
                UploadFields {
                    path: Some("docs/"),
                    ..Default::default()
                },
                &token,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        app.upload(&token, "a.txt", b"a").await;
        let storage_id = app.storage_of(owner).await.id;

        let res = app.get_with_token(&routes::storage(storage_id), &token).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["id"], storage_id);
        assert_eq!(res.body["files_count"], 3);
        assert_eq!(res.body["files_size"], 6);
        assert_eq!(res.body["max_size"], DEFAULT_MAX_BYTES);
        assert_eq!(res.body["owner"]["id"], owner);
        assert_eq!(res.body["owner"]["username"], "alice");

        let names: Vec<(&str, &str)> = res.body["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| (f["path"].as_str().unwrap(), f["name"].as_str().unwrap()))
            .collect();
        assert_eq!(names, [("", "a.txt"), ("", "z.txt"), ("docs/", "b.txt")]);
    }

    #[tokio::test]
    async fn new_owner_reaches_their_storage_through_me() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let me = app.get_with_token(routes::ME, &token).await;
        assert_eq!(me.status, 200, "{}", me.text);
        let storage_id = me.body["storage_id"].as_i64().unwrap() as i32;

        let res = app.get_with_token(&routes::storage(storage_id), &token).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["files_count"], 0);
        assert_eq!(res.body["files_size"], 0);
        assert_eq!(res.body["owner"]["username"], "alice");
        assert!(res.body["files"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_users_cannot_see_a_storage() {
        let app = TestApp::spawn().await;
        app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob_b", "securepass").await;
        let alice_storage = app.storage_of(app.user_id("alice").await).await.id;

        let res = app.get_with_token(&routes::storage(alice_storage), &bob).await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn staff_can_see_any_storage() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let staff = app.create_staff_user("admin", "securepass").await;
        app.upload(&alice, "a.txt", b"abc").await;
        let alice_storage = app.storage_of(app.user_id("alice").await).await.id;

        let res = app.get_with_token(&routes::storage(alice_storage), &staff).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["files"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_storage_is_not_found() {
        let app = TestApp::spawn().await;
        let staff = app.create_staff_user("admin", "securepass").await;

        let res = app.get_with_token(&routes::storage(9999), &staff).await;

        assert_eq!(res.status, 404);
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn staff_lists_usage_of_every_user() {
        let app = TestApp::spawn().await;
        let staff = app.create_staff_user("admin", "securepass").await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        app.upload(&alice, "a.txt", b"12345").await;

        let res = app.get_with_token(routes::STORAGES, &staff).await;

        assert_eq!(res.status, 200, "{}", res.text);
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        let alice_row = data
            .iter()
            .find(|s| s["owner"]["username"] == "alice")
            .expect("alice's storage should be listed");
        assert_eq!(alice_row["files_count"], 1);
        assert_eq!(alice_row["files_size"], 5);
        assert!(alice_row.get("files").is_none());
        assert_eq!(res.body["pagination"]["total"], 2);
    }

    #[tokio::test]
    async fn regular_user_cannot_list_storages() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app.get_with_token(routes::STORAGES, &token).await;

        assert_eq!(res.status, 403);
    }
}

mod quota {
    use super::*;

    #[tokio::test]
    async fn upload_that_would_pass_the_ceiling_is_rejected() {
        let app = TestApp::spawn_with_quota(1000).await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let owner = app.user_id("alice").await;

        app.upload(&token, "first.bin", &[1u8; 600]).await;

        let res = app
            .upload_with_token(
                "second.bin",
                vec![2u8; 401],
                UploadFields::default(),
                &token,
            )
            .await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "QUOTA_EXCEEDED");
        assert!(!app.media_path("alice/second.bin").exists());

        let storage = app.storage_of(owner).await;
        assert_eq!(storage.files_count, 1);
        assert_eq!(storage.files_size, 600);
    }

    #[tokio::test]
    async fn duplicate_is_reported_before_quota() {
        let app = TestApp::spawn_with_quota(1000).await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let owner = app.user_id("alice").await;

        let a = app.upload(&token, "a.bin", &[1u8; 600]).await;
        assert_eq!(app.storage_of(owner).await.files_size, 600);

        let same_name = app
            .upload_with_token("a.bin", vec![2u8; 500], UploadFields::default(), &token)
            .await;
        assert_eq!(same_name.status, 400);
        assert_eq!(same_name.body["code"], "DUPLICATE_FILE");

        let other_name = app
            .upload_with_token("c.bin", vec![3u8; 500], UploadFields::default(), &token)
            .await;
        assert_eq!(other_name.status, 400);
        assert_eq!(other_name.body["code"], "QUOTA_EXCEEDED");

        let row = app.storage_of(owner).await;
        assert_eq!((row.files_count, row.files_size), (1, 600));

        let id = a["id"].as_i64().unwrap() as i32;
        let res = app.delete_with_token(&routes::file(id), &token).await;
        assert_eq!(res.status, 204);
        let row = app.storage_of(owner).await;
        assert_eq!((row.files_count, row.files_size), (0, 0));

        let download = app.get_without_token(a["url_path"].as_str().unwrap()).await;
        assert_eq!(download.status, 404);
    }

    #[tokio::test]
    async fn upload_filling_the_quota_exactly_is_accepted() {
        let app = TestApp::spawn_with_quota(1000).await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        app.upload(&token, "first.bin", &[1u8; 600]).await;
        app.upload(&token, "second.bin", &[2u8; 400]).await;

        let storage = app.storage_of(app.user_id("alice").await).await;
        assert_eq!(storage.files_size, 1000);

        let res = app
            .upload_with_token("third.bin", vec![3u8; 1], UploadFields::default(), &token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "QUOTA_EXCEEDED");
    }

    #[tokio::test]
    async fn deleting_frees_room_for_new_uploads() {
        let app = TestApp::spawn_with_quota(1000).await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let first = app.upload(&token, "first.bin", &[1u8; 900]).await;
        let id = first["id"].as_i64().unwrap() as i32;

        let res = app.delete_with_token(&routes::file(id), &token).await;
        assert_eq!(res.status, 204);

        app.upload(&token, "second.bin", &[2u8; 900]).await;
        let storage = app.storage_of(app.user_id("alice").await).await;
        assert_eq!(storage.files_count, 1);
        assert_eq!(storage.files_size, 900);
    }

    #[tokio::test]
    async fn quota_is_tracked_per_user() {
        let app = TestApp::spawn_with_quota(1000).await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob_b", "securepass").await;

        app.upload(&alice, "a.bin", &[1u8; 1000]).await;
        app.upload(&bob, "a.bin", &[2u8; 1000]).await;

        assert_eq!(app.storage_of(app.user_id("alice").await).await.files_size, 1000);
        assert_eq!(app.storage_of(app.user_id("bob_b").await).await.files_size, 1000);
        assert!(app.media_path("alice/a.bin").is_file());
        assert!(app.media_path("bob_b/a.bin").is_file());
    }
}
