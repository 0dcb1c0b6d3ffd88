use serde_json::json;

use crate::common::{TestApp, UploadFields, routes};

mod upload {
    use super::*;

    #[tokio::test]
    async fn upload_defaults_to_root_and_the_uploaded_filename() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let body = app.upload(&token, "notes.txt", b"hello world").await;

        assert_eq!(body["name"], "notes.txt");
        assert_eq!(body["origin_name"], "notes.txt");
        assert_eq!(body["path"], "");
        assert_eq!(body["size"], 11);
        assert_eq!(body["note"], "");
        assert_eq!(body["content_type"], "text/plain");
        assert!(body["last_download"].is_null());
        let public_id = body["public_id"].as_str().unwrap();
        assert_eq!(body["url_path"], routes::download(public_id));

        let on_disk = std::fs::read(app.media_path("alice/notes.txt")).unwrap();
        assert_eq!(on_disk, b"hello world");
    }

    #[tokio::test]
    async fn upload_with_explicit_name_path_and_note() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .upload_with_token(
                "Scan 001.pdf",
                b"%PDF".to_vec(),
                UploadFields {
                    name: Some("  contract.pdf "),
                    path: Some("home/docs/"),
                    note: Some("signed"),
                },
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["name"], "contract.pdf");
        assert_eq!(res.body["origin_name"], "Scan 001.pdf");
        assert_eq!(res.body["path"], "home/docs/");
        assert_eq!(res.body["note"], "signed");
        assert_eq!(res.body["content_type"], "application/pdf");
        assert!(app.media_path("alice/home/docs/contract.pdf").is_file());
    }

    #[tokio::test]
    async fn upload_requires_authentication() {
        let app = TestApp::spawn().await;

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(b"x".to_vec()).file_name("x.txt"),
        );
        let res = app
            .client
            .post(format!("http://{}{}", app.addr, routes::FILES))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 401);
    }

    #[tokio::test]
    async fn upload_without_file_part_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let form = reqwest::multipart::Form::new().text("name", "a.txt");
        let res = app
            .client
            .post(format!("http://{}{}", app.addr, routes::FILES))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 400);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["field"], "file");
    }

    #[tokio::test]
    async fn malformed_paths_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        for path in ["/abs/", "docs", "a//b/", "../up/", "a/./b/"] {
            let res = app
                .upload_with_token(
                    "a.txt",
                    b"data".to_vec(),
                    UploadFields {
                        path: Some(path),
                        ..Default::default()
                    },
                    &token,
                )
                .await;
            assert_eq!(res.status, 400, "path {path:?} should be rejected");
            assert_eq!(res.body["code"], "VALIDATION_ERROR");
            assert_eq!(res.body["field"], "path", "path {path:?}");
        }

        let storage = app.storage_of(app.user_id("alice").await).await;
        assert_eq!(storage.files_count, 0);
    }

    #[tokio::test]
    async fn dot_entry_or_separator_names_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        for name in [".", "..", "a/b.txt", "a\\b.txt"] {
            let res = app
                .upload_with_token(
                    "a.txt",
                    b"data".to_vec(),
                    UploadFields {
                        name: Some(name),
                        ..Default::default()
                    },
                    &token,
                )
                .await;
            assert_eq!(res.status, 400, "name {name:?} should be rejected");
            assert_eq!(res.body["field"], "name");
        }
    }

    #[tokio::test]
    async fn dotfiles_are_stored_under_the_namespace() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let env = app.upload(&token, ".env", b"KEY=value").await;
        let res = app
            .upload_with_token(
                "ignore.txt",
                b"target/".to_vec(),
                UploadFields {
                    name: Some(".gitignore"),
                    path: Some("repo/"),
                    ..Default::default()
                },
                &token,
            )
            .await;

        assert_eq!(env["name"], ".env");
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["name"], ".gitignore");
        assert_eq!(std::fs::read(app.media_path("alice/.env")).unwrap(), b"KEY=value");
        assert!(app.media_path("alice/repo/.gitignore").is_file());

        let storage = app.storage_of(app.user_id("alice").await).await;
        assert_eq!((storage.files_count, storage.files_size), (2, 16));
    }

    #[tokio::test]
    async fn too_long_note_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let note = "n".repeat(1001);

        let res = app
            .upload_with_token(
                "a.txt",
                b"data".to_vec(),
                UploadFields {
                    note: Some(&note),
                    ..Default::default()
                },
                &token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["field"], "note");
    }

    #[tokio::test]
    async fn duplicate_name_in_the_same_directory_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        app.upload(&token, "a.txt", b"first").await;

        let res = app
            .upload_with_token("a.txt", b"second".to_vec(), UploadFields::default(), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "DUPLICATE_FILE");
        assert_eq!(
            res.body["message"],
            "File with path '' and name 'a.txt' already exists."
        );

        let on_disk = std::fs::read(app.media_path("alice/a.txt")).unwrap();
        assert_eq!(on_disk, b"first");
        let storage = app.storage_of(app.user_id("alice").await).await;
        assert_eq!(storage.files_count, 1);
        assert_eq!(storage.files_size, 5);
    }

    #[tokio::test]
    async fn same_name_in_another_directory_is_allowed() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        app.upload(&token, "a.txt", b"root").await;

        let res = app
            .upload_with_token(
                "a.txt",
                b"nested".to_vec(),
                UploadFields {
                    path: Some("sub/"),
                    ..Default::default()
                },
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        let storage = app.storage_of(app.user_id("alice").await).await;
        assert_eq!(storage.files_count, 2);
        assert_eq!(storage.files_size, 10);
    }

    #[tokio::test]
    async fn upload_larger_than_the_size_limit_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .upload_with_token(
                "big.bin",
                vec![7u8; 540 * 1024],
                UploadFields::default(),
                &token,
            )
            .await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(res.body["field"], "file");
        assert!(!app.media_path("alice/big.bin").exists());
    }

    #[tokio::test]
    async fn unregistered_bytes_at_the_target_are_not_overwritten() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let stray = app.media_path("alice/stray.txt");
        std::fs::create_dir_all(stray.parent().unwrap()).unwrap();
        std::fs::write(&stray, b"keep me").unwrap();

        let res = app
            .upload_with_token("stray.txt", b"new".to_vec(), UploadFields::default(), &token)
            .await;

        assert_eq!(res.status, 409, "{}", res.text);
        assert_eq!(res.body["code"], "CONFLICT");
        assert_eq!(std::fs::read(&stray).unwrap(), b"keep me");
        let storage = app.storage_of(app.user_id("alice").await).await;
        assert_eq!(storage.files_count, 0);
        assert_eq!(storage.files_size, 0);
    }
}

mod download {
    use super::*;

    #[tokio::test]
    async fn anyone_with_the_link_can_download() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let file = app.upload(&token, "hello.txt", b"hello world").await;

        let res = app
            .get_raw(file["url_path"].as_str().unwrap(), None)
            .await;

        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["content-type"], "text/plain");
        assert_eq!(res.headers()["content-length"], "11");
        assert!(
            res.headers()["content-disposition"]
                .to_str()
                .unwrap()
                .starts_with("inline; filename=\"hello.txt\"")
        );
        assert!(res.headers().contains_key("etag"));
        assert_eq!(res.bytes().await.unwrap().as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn download_stamps_last_download() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let file = app.upload(&token, "hello.txt", b"hello").await;
        let id = file["id"].as_i64().unwrap() as i32;

        let res = app
            .get_raw(file["url_path"].as_str().unwrap(), None)
            .await;
        assert_eq!(res.status(), 200);

        let record = app.files.find(id).await.unwrap();
        assert!(record.last_download.is_some());
    }

    #[tokio::test]
    async fn matching_etag_returns_not_modified() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let file = app.upload(&token, "hello.txt", b"hello").await;
        let url = file["url_path"].as_str().unwrap();

        let first = app.get_raw(url, None).await;
        let etag = first.headers()["etag"].to_str().unwrap().to_string();

        let second = app.get_raw(url, Some(&etag)).await;
        assert_eq!(second.status(), 304);
    }

    #[tokio::test]
    async fn download_alias_serves_the_same_bytes() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let file = app.upload(&token, "hello.txt", b"hello").await;
        let public_id = file["public_id"].as_str().unwrap();

        let res = app
            .get_raw(&format!("/api/v1/download/{public_id}"), None)
            .await;

        assert_eq!(res.status(), 200);
        assert_eq!(res.bytes().await.unwrap().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_not_found() {
        let app = TestApp::spawn().await;

        let unknown = app
            .get_without_token(&routes::download("00000000-0000-0000-0000-000000000000"))
            .await;
        assert_eq!(unknown.status, 404);
        assert_eq!(unknown.body["code"], "NOT_FOUND");

        let malformed = app.get_without_token(&routes::download("not-a-uuid")).await;
        assert_eq!(malformed.status, 404);
    }

    #[tokio::test]
    async fn missing_bytes_are_reported_as_not_found() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let file = app.upload(&token, "gone.txt", b"bytes").await;
        std::fs::remove_file(app.media_path("alice/gone.txt")).unwrap();

        let res = app
            .get_without_token(file["url_path"].as_str().unwrap())
            .await;

        assert_eq!(res.status, 404);
    }
}

mod update {
    use super::*;

    #[tokio::test]
    async fn rename_moves_the_bytes_and_keeps_the_link() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let file = app
            .upload_with_token(
                "a.txt",
                b"content".to_vec(),
                UploadFields {
                    path: Some("docs/"),
                    ..Default::default()
                },
                &token,
            )
            .await;
        assert_eq!(file.status, 201, "{}", file.text);
        let id = file.id();

        let res = app
            .patch_with_token(&routes::file(id), &json!({"name": "b.txt"}), &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["name"], "b.txt");
        assert_eq!(res.body["path"], "docs/");
        assert_eq!(res.body["public_id"], file.body["public_id"]);
        assert!(!app.media_path("alice/docs/a.txt").exists());
        assert_eq!(
            std::fs::read(app.media_path("alice/docs/b.txt")).unwrap(),
            b"content"
        );

        let storage = app.storage_of(app.user_id("alice").await).await;
        assert_eq!(storage.files_count, 1);
        assert_eq!(storage.files_size, 7);

        let download = app
            .get_raw(file.body["url_path"].as_str().unwrap(), None)
            .await;
        assert_eq!(download.bytes().await.unwrap().as_ref(), b"content");
    }

    #[tokio::test]
    async fn rename_onto_an_existing_name_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let a = app.upload(&token, "a.txt", b"aaa").await;
        app.upload(&token, "b.txt", b"bbb").await;
        let id = a["id"].as_i64().unwrap() as i32;

        let res = app
            .patch_with_token(&routes::file(id), &json!({"name": "b.txt"}), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "DUPLICATE_FILE");
        assert_eq!(std::fs::read(app.media_path("alice/a.txt")).unwrap(), b"aaa");
        assert_eq!(std::fs::read(app.media_path("alice/b.txt")).unwrap(), b"bbb");
    }

    #[tokio::test]
    async fn note_can_be_changed_alone() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let file = app.upload(&token, "a.txt", b"aaa").await;
        let id = file["id"].as_i64().unwrap() as i32;

        let res = app
            .patch_with_token(&routes::file(id), &json!({"note": "remember"}), &token)
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["note"], "remember");
        assert_eq!(res.body["name"], "a.txt");
        assert!(app.media_path("alice/a.txt").is_file());
    }

    #[tokio::test]
    async fn invalid_new_name_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let file = app.upload(&token, "a.txt", b"aaa").await;
        let id = file["id"].as_i64().unwrap() as i32;

        let res = app
            .patch_with_token(&routes::file(id), &json!({"name": "../x"}), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["field"], "name");
    }

    #[tokio::test]
    async fn other_users_cannot_modify_a_file() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob_b", "securepass").await;
        let file = app.upload(&alice, "a.txt", b"aaa").await;
        let id = file["id"].as_i64().unwrap() as i32;

        let res = app
            .patch_with_token(&routes::file(id), &json!({"name": "mine.txt"}), &bob)
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn staff_can_rename_any_file() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let staff = app.create_staff_user("admin", "securepass").await;
        let file = app.upload(&alice, "a.txt", b"aaa").await;
        let id = file["id"].as_i64().unwrap() as i32;

        let res = app
            .patch_with_token(&routes::file(id), &json!({"name": "z.txt"}), &staff)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert!(app.media_path("alice/z.txt").is_file());
    }

    #[tokio::test]
    async fn unknown_file_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .patch_with_token(&routes::file(4242), &json!({"note": "x"}), &token)
            .await;

        assert_eq!(res.status, 404);
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn delete_removes_bytes_and_releases_quota() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        app.upload(&token, "keep.txt", b"keep").await;
        let file = app.upload(&token, "drop.txt", b"dropped").await;
        let id = file["id"].as_i64().unwrap() as i32;

        let res = app.delete_with_token(&routes::file(id), &token).await;

        assert_eq!(res.status, 204, "{}", res.text);
        assert!(!app.media_path("alice/drop.txt").exists());
        let storage = app.storage_of(app.user_id("alice").await).await;
        assert_eq!(storage.files_count, 1);
        assert_eq!(storage.files_size, 4);

        let download = app
            .get_without_token(file["url_path"].as_str().unwrap())
            .await;
        assert_eq!(download.status, 404);
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let file = app.upload(&token, "a.txt", b"aaa").await;
        let id = file["id"].as_i64().unwrap() as i32;

        let first = app.delete_with_token(&routes::file(id), &token).await;
        assert_eq!(first.status, 204);
        let second = app.delete_with_token(&routes::file(id), &token).await;
        assert_eq!(second.status, 404);

        let storage = app.storage_of(app.user_id("alice").await).await;
        assert_eq!(storage.files_count, 0);
        assert_eq!(storage.files_size, 0);
    }

    #[tokio::test]
    async fn other_users_cannot_delete_a_file() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob_b", "securepass").await;
        let file = app.upload(&alice, "a.txt", b"aaa").await;
        let id = file["id"].as_i64().unwrap() as i32;

        let res = app.delete_with_token(&routes::file(id), &bob).await;

        assert_eq!(res.status, 403);
        assert!(app.media_path("alice/a.txt").is_file());
    }

    #[tokio::test]
    async fn deleting_a_file_whose_bytes_vanished_still_succeeds() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let file = app.upload(&token, "a.txt", b"aaa").await;
        let id = file["id"].as_i64().unwrap() as i32;
        std::fs::remove_file(app.media_path("alice/a.txt")).unwrap();

        let res = app.delete_with_token(&routes::file(id), &token).await;

        assert_eq!(res.status, 204);
        let storage = app.storage_of(app.user_id("alice").await).await;
        assert_eq!(storage.files_count, 0);
        assert_eq!(storage.files_size, 0);
    }
}
