//! Behaviour every `MetadataStore` implementation must share.
//!
//! Each backend's test module runs these against a fresh store.

use super::*;
use crate::keys::generate_key;
use crate::pdf::ImageFormat;

pub async fn put_document(store: &dyn MetadataStore, fs: &FileSystem, data: &[u8]) -> StoredDocument {
    let key = generate_key();
    let disk_name = format!("{}-test.pdf", key);
    let path = fs.document_path(&disk_name);
    fs.write(&path, data).await.unwrap();

    store
        .store_document(NewDocument {
            key,
            name: "test.pdf".to_string(),
            disk_name,
            path: path.to_string_lossy().to_string(),
            size: data.len() as i64,
            mime_type: "application/pdf".to_string(),
        })
        .await
        .unwrap()
}

pub async fn put_image(
    store: &dyn MetadataStore,
    fs: &FileSystem,
    document_key: &str,
    page_number: u32,
) -> StoredImage {
    let key = generate_key();
    let disk_name = format!("{}.png", key);
    let path = fs.image_path(&disk_name);
    fs.write(&path, b"png bytes").await.unwrap();

    store
        .store_image(NewImage {
            key,
            document_key: document_key.to_string(),
            name: format!("test_page_{}.png", page_number),
            disk_name,
            path: path.to_string_lossy().to_string(),
            size: 9,
            mime_type: "image/png".to_string(),
            page_number,
            format: ImageFormat::Png,
            width: Some(10),
            height: None,
        })
        .await
        .unwrap()
}

pub async fn document_round_trip(store: &dyn MetadataStore, fs: &FileSystem) {
    let stored = put_document(store, fs, b"%PDF-1.5 body").await;

    let fetched = store.get_document(&stored.key).await.unwrap();
    assert_eq!(fetched.key, stored.key);
    assert_eq!(fetched.name, "test.pdf");
    assert_eq!(fetched.size as u64, fs.stat(&fetched.path).await.unwrap());

    let listed = store.list_documents().await.unwrap();
    assert_eq!(listed.len(), 1);

    let image = put_image(store, fs, &stored.key, 2).await;
    let fetched = store.get_image(&image.key).await.unwrap();
    assert_eq!(fetched.document_key, stored.key);
    assert_eq!(fetched.page_number, 2);
    assert_eq!(fetched.format, ImageFormat::Png);
    assert_eq!(fetched.width, Some(10));
    assert_eq!(fetched.height, None);
    assert_eq!(store.list_images().await.unwrap().len(), 1);
}

pub async fn duplicate_key_conflicts(store: &dyn MetadataStore, fs: &FileSystem) {
    let stored = put_document(store, fs, b"%PDF-1.5").await;

    let result = store
        .store_document(NewDocument {
            key: stored.key.clone(),
            name: "other.pdf".to_string(),
            disk_name: stored.disk_name.clone(),
            path: stored.path.clone(),
            size: 1,
            mime_type: "application/pdf".to_string(),
        })
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

pub async fn missing_file_heals_record(store: &dyn MetadataStore, fs: &FileSystem) {
    let document = put_document(store, fs, b"%PDF-1.5").await;
    let image = put_image(store, fs, &document.key, 1).await;

    // Image first: its own record heals
    fs.delete(&image.path).await.unwrap();
    assert!(matches!(store.get_image(&image.key).await, Err(AppError::NotFound(_))));
    assert!(store.list_images_by_parent(&document.key).await.unwrap().is_empty());

    store
        .set_status(
            StatusTable::Truncation,
            &document.key,
            ProcessingStatus::new(ProcessingState::Completed),
        )
        .await
        .unwrap();

    fs.delete(&document.path).await.unwrap();
    assert!(matches!(
        store.get_document(&document.key).await,
        Err(AppError::NotFound(_))
    ));

    // The stale row is gone, together with what cascades from it
    assert!(store.list_documents().await.unwrap().is_empty());
    assert!(store
        .get_status(StatusTable::Truncation, &document.key)
        .await
        .is_err());
}

pub async fn delete_document_cascades(store: &dyn MetadataStore, fs: &FileSystem) {
    let document = put_document(store, fs, b"%PDF-1.5").await;
    let mut images = Vec::new();
    for page in 1..=3 {
        images.push(put_image(store, fs, &document.key, page).await);
    }
    for table in [StatusTable::Truncation, StatusTable::ImageConversion] {
        store
            .set_status(table, &document.key, ProcessingStatus::new(ProcessingState::Completed))
            .await
            .unwrap();
    }

    // An unrelated document must survive
    let other = put_document(store, fs, b"%PDF-1.5 other").await;
    let other_image = put_image(store, fs, &other.key, 1).await;

    store.delete_document(&document.key).await.unwrap();

    assert!(!fs.exists(&document.path).await);
    for image in &images {
        assert!(!fs.exists(&image.path).await);
        assert!(matches!(store.get_image(&image.key).await, Err(AppError::NotFound(_))));
    }
    assert!(matches!(
        store.get_document(&document.key).await,
        Err(AppError::NotFound(_))
    ));
    for table in [StatusTable::Truncation, StatusTable::ImageConversion] {
        assert!(matches!(
            store.get_status(table, &document.key).await,
            Err(AppError::NotFound(_))
        ));
    }

    assert!(store.get_document(&other.key).await.is_ok());
    assert!(store.get_image(&other_image.key).await.is_ok());
    assert_eq!(store.list_images().await.unwrap().len(), 1);
}

pub async fn second_delete_is_not_found(store: &dyn MetadataStore, fs: &FileSystem) {
    let document = put_document(store, fs, b"%PDF-1.5").await;
    let image = put_image(store, fs, &document.key, 1).await;

    store.delete_image(&image.key).await.unwrap();
    assert!(matches!(store.delete_image(&image.key).await, Err(AppError::NotFound(_))));

    store.delete_document(&document.key).await.unwrap();
    assert!(matches!(
        store.delete_document(&document.key).await,
        Err(AppError::NotFound(_))
    ));
}

pub async fn delete_tolerates_missing_files(store: &dyn MetadataStore, fs: &FileSystem) {
    let document = put_document(store, fs, b"%PDF-1.5").await;
    let image = put_image(store, fs, &document.key, 1).await;

    fs.delete(&image.path).await.unwrap();
    fs.delete(&document.path).await.unwrap();

    store.delete_document(&document.key).await.unwrap();
    assert!(store.list_documents().await.unwrap().is_empty());
    assert!(store.list_images().await.unwrap().is_empty());
}

pub async fn delete_images_by_parent(store: &dyn MetadataStore, fs: &FileSystem) {
    let document = put_document(store, fs, b"%PDF-1.5").await;
    let first = put_image(store, fs, &document.key, 1).await;
    let second = put_image(store, fs, &document.key, 2).await;

    let listed = store.list_images_by_parent(&document.key).await.unwrap();
    assert_eq!(listed.len(), 2);

    let removed = store.delete_images_by_parent(&document.key).await.unwrap();
    assert_eq!(removed, 2);
    assert!(!fs.exists(&first.path).await);
    assert!(!fs.exists(&second.path).await);

    // The document itself stays
    assert!(store.get_document(&document.key).await.is_ok());
    assert_eq!(store.delete_images_by_parent(&document.key).await.unwrap(), 0);
}

pub async fn image_requires_parent(store: &dyn MetadataStore, fs: &FileSystem) {
    let path = fs.image_path("orphan.png");
    fs.write(&path, b"png").await.unwrap();

    let result = store
        .store_image(NewImage {
            key: generate_key(),
            document_key: "no-such-document".to_string(),
            name: "orphan.png".to_string(),
            disk_name: "orphan.png".to_string(),
            path: path.to_string_lossy().to_string(),
            size: 3,
            mime_type: "image/png".to_string(),
            page_number: 1,
            format: ImageFormat::Png,
            width: None,
            height: None,
        })
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

pub async fn status_merge_update(store: &dyn MetadataStore) {
    let key = generate_key();
    let table = StatusTable::Truncation;

    assert!(matches!(
        store.update_status(table, &key, StatusUpdate::progress(10)).await,
        Err(AppError::NotFound(_))
    ));

    let initial = ProcessingStatus::new(ProcessingState::Processing);
    store.set_status(table, &key, initial.clone()).await.unwrap();

    let updated = store
        .update_status(table, &key, StatusUpdate::progress(50))
        .await
        .unwrap();
    assert_eq!(updated.status, ProcessingState::Processing);
    assert_eq!(updated.progress, 50);
    assert_eq!(updated.created_at, initial.created_at);

    let fetched = store.get_status(table, &key).await.unwrap();
    assert_eq!(fetched, updated);

    let finished = store
        .update_status(table, &key, StatusUpdate::completed())
        .await
        .unwrap();
    assert_eq!(finished.status, ProcessingState::Completed);
    assert_eq!(finished.progress, 100);
    assert!(finished.completed_at.is_some());

    // A later run overwrites the terminal row
    store
        .set_status(table, &key, ProcessingStatus::new(ProcessingState::Processing))
        .await
        .unwrap();
    let restarted = store.get_status(table, &key).await.unwrap();
    assert_eq!(restarted.progress, 0);
    assert!(restarted.completed_at.is_none());
}

pub async fn status_tables_are_independent(store: &dyn MetadataStore) {
    let key = generate_key();

    store
        .set_status(
            StatusTable::ImageConversion,
            &key,
            ProcessingStatus::new(ProcessingState::Processing),
        )
        .await
        .unwrap();

    assert!(store.get_status(StatusTable::ImageConversion, &key).await.is_ok());
    assert!(matches!(
        store.get_status(StatusTable::Truncation, &key).await,
        Err(AppError::NotFound(_))
    ));
}
