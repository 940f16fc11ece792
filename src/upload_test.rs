use super::*;

// =============================================================
// normalize_response
// =============================================================

#[test]
fn success_body_becomes_uploaded() {
    let result = normalize_response(
        StatusCode::OK,
        r#"{"filename":"clip.mp4","message":"File uploaded successfully","file_type":"video"}"#,
    );
    assert_eq!(
        result,
        UploadResult::Uploaded {
            filename: "clip.mp4".to_owned(),
            media: MediaKind::Video,
            message: Some("File uploaded successfully".to_owned()),
        }
    );
}

#[test]
fn success_without_file_type_defaults_to_image() {
    let result = normalize_response(StatusCode::CREATED, r#"{"filename":"a.png"}"#);
    assert!(matches!(result, UploadResult::Uploaded { media: MediaKind::Image, .. }));
}

#[test]
fn success_status_with_garbage_body_fails() {
    let result = normalize_response(StatusCode::OK, "<html>oops</html>");
    let UploadResult::Failed { error } = result else {
        panic!("expected failure");
    };
    assert!(error.starts_with("invalid upload response"));
}

#[test]
fn error_body_is_passed_through() {
    let result = normalize_response(StatusCode::BAD_REQUEST, r#"{"error":"File type not allowed"}"#);
    assert_eq!(result, UploadResult::Failed { error: "File type not allowed".to_owned() });
}

#[test]
fn error_status_without_body_reports_status() {
    let result = normalize_response(StatusCode::BAD_GATEWAY, "");
    assert_eq!(result, UploadResult::Failed { error: "HTTP 502".to_owned() });
}

// =============================================================
// prompt + media helpers
// =============================================================

#[test]
fn upload_prompt_mentions_kind_and_filename() {
    assert_eq!(
        upload_prompt("a.png", MediaKind::Image),
        "I just uploaded an image: a.png. Can you help me with this image?"
    );
    assert_eq!(
        upload_prompt("b.mp4", MediaKind::Video),
        "I just uploaded a video: b.mp4. Can you help me with this video?"
    );
}

#[test]
fn media_kind_from_file_type() {
    assert_eq!(MediaKind::from_file_type(Some("video")), MediaKind::Video);
    assert_eq!(MediaKind::from_file_type(Some("image")), MediaKind::Image);
    assert_eq!(MediaKind::from_file_type(Some("audio")), MediaKind::Image);
    assert_eq!(MediaKind::from_file_type(None), MediaKind::Image);
}

#[test]
fn guess_mime_by_extension() {
    assert_eq!(guess_mime("photo.JPG"), Some("image/jpeg"));
    assert_eq!(guess_mime("clip.mp4"), Some("video/mp4"));
    assert_eq!(guess_mime("notes.txt"), None);
    assert_eq!(guess_mime("no_extension"), None);
}

#[tokio::test]
async fn upload_file_missing_path_fails_without_network() {
    let client = UploadClient::new("http://127.0.0.1:9/upload-media", Duration::from_secs(1)).unwrap();
    let result = client.upload_file(Path::new("/definitely/not/here.png")).await;
    let UploadResult::Failed { error } = result else {
        panic!("expected failure");
    };
    assert!(error.contains("cannot read"));
}
