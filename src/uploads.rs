//! Multipart listing forms and the image files they carry.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use actix_multipart::{Field, Multipart};
use actix_web::{http::header, web, HttpResponse};
use futures_util::TryStreamExt;
use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::property::PropertyForm;

pub const MAX_IMAGES: usize = 10;
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const MAX_TEXT_BYTES: usize = 64 * 1024;
/// Prefix under which stored images are addressed by clients.
pub const PUBLIC_PREFIX: &str = "uploads";

#[derive(Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// `image1..imageN`
    Image(usize),
    /// `amenities[i]`; plain `amenities`/`amenities[]` sort after indexed ones
    Amenity(usize),
    Text,
}

pub fn classify_field(name: &str) -> FieldKind {
    if let Some(n) = name.strip_prefix("image") {
        if let Ok(idx) = n.parse::<usize>() {
            return FieldKind::Image(idx);
        }
    }
    if name == "amenities" || name == "amenities[]" {
        return FieldKind::Amenity(usize::MAX);
    }
    if let Some(idx) = name
        .strip_prefix("amenities[")
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|n| n.parse::<usize>().ok())
    {
        return FieldKind::Amenity(idx);
    }
    FieldKind::Text
}

/// Extension for a stored image: the uploaded name's if it looks sane,
/// otherwise derived from the content type.
pub fn image_extension(filename: Option<&str>, subtype: Option<&str>) -> String {
    let from_name = filename
        .and_then(|f| Path::new(f).extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()));
    from_name
        .or_else(|| {
            subtype
                .map(|s| s.to_ascii_lowercase())
                .filter(|s| s.chars().all(|c| c.is_ascii_alphanumeric()))
        })
        .unwrap_or_else(|| "bin".to_string())
}

async fn read_text(mut field: Field) -> ApiResult<String> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(bad_multipart)? {
        if buf.len() + chunk.len() > MAX_TEXT_BYTES {
            return Err(ApiError::BadRequest("Form field too large".into()));
        }
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf).map_err(|_| ApiError::BadRequest("Form field is not UTF-8".into()))
}

async fn save_image(mut field: Field, upload_dir: &str) -> ApiResult<String> {
    let is_image = field
        .content_type()
        .map(|m| m.type_().as_str() == "image")
        .unwrap_or(false);
    if !is_image {
        return Err(ApiError::BadRequest("Only image files can be uploaded".into()));
    }
    let ext = image_extension(
        field.content_disposition().and_then(|cd| cd.get_filename()),
        field.content_type().map(|m| m.subtype().as_str()),
    );

    let file_name = format!("{}.{}", Uuid::new_v4(), ext);
    let disk_path = PathBuf::from(upload_dir).join(&file_name);
    let mut file = tokio::fs::File::create(&disk_path)
        .await
        .map_err(|e| ApiError::Internal(format!("create {}: {}", disk_path.display(), e)))?;

    let mut written = 0usize;
    while let Some(chunk) = field.try_next().await.map_err(bad_multipart)? {
        written += chunk.len();
        if written > MAX_IMAGE_BYTES {
            drop(file);
            remove_quietly(&disk_path).await;
            return Err(ApiError::BadRequest("Image too large".into()));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::Internal(format!("write {}: {}", disk_path.display(), e)))?;
    }
    debug!("stored image {} ({} bytes)", file_name, written);
    Ok(format!("{}/{}", PUBLIC_PREFIX, file_name))
}

/// Reads a listing form. Images are written to `upload_dir` as they stream
/// in; if the form turns out to be unusable they are removed again.
pub async fn read_property_form(mut payload: Multipart, upload_dir: &str) -> ApiResult<PropertyForm> {
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("create upload dir: {}", e)))?;

    let mut fields = HashMap::new();
    let mut amenities: BTreeMap<(usize, usize), String> = BTreeMap::new();
    let mut saw_amenities = false;
    let mut images: BTreeMap<usize, String> = BTreeMap::new();

    let result: ApiResult<()> = async {
        while let Some(field) = payload.try_next().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            match classify_field(&name) {
                FieldKind::Image(idx) => {
                    if images.len() >= MAX_IMAGES {
                        return Err(ApiError::BadRequest(format!(
                            "At most {} images are allowed",
                            MAX_IMAGES
                        )));
                    }
                    let stored = save_image(field, upload_dir).await?;
                    if let Some(replaced) = images.insert(idx, stored) {
                        discard_images(&[replaced], upload_dir).await;
                    }
                }
                FieldKind::Amenity(idx) => {
                    saw_amenities = true;
                    let value = read_text(field).await?;
                    let value = value.trim();
                    if !value.is_empty() {
                        amenities.insert((idx, amenities.len()), value.to_string());
                    }
                }
                FieldKind::Text => {
                    let value = read_text(field).await?;
                    fields.insert(name, value);
                }
            }
        }
        Ok(())
    }
    .await;

    let images: Vec<String> = images.into_values().collect();
    if let Err(e) = result {
        discard_images(&images, upload_dir).await;
        return Err(e);
    }

    Ok(PropertyForm {
        fields,
        amenities: saw_amenities.then(|| amenities.into_values().collect()),
        images,
    })
}

fn disk_path(stored: &str, upload_dir: &str) -> Option<PathBuf> {
    let name = stored.strip_prefix(PUBLIC_PREFIX)?.trim_start_matches('/');
    is_safe_name(name).then(|| PathBuf::from(upload_dir).join(name))
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("could not remove {}: {}", path.display(), e);
    }
}

/// Deletes stored images, logging rather than failing on errors.
pub async fn discard_images(stored: &[String], upload_dir: &str) {
    for path in stored.iter().filter_map(|s| disk_path(s, upload_dir)) {
        remove_quietly(&path).await;
    }
}

fn content_type_for(name: &str) -> &'static str {
    match Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

/// GET /uploads/{file}
pub async fn serve_upload(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let name = path.into_inner();
    if !is_safe_name(&name) {
        return Err(ApiError::NotFound("File"));
    }
    let disk = PathBuf::from(&data.config.upload_dir).join(&name);
    match tokio::fs::read(&disk).await {
        Ok(bytes) => Ok(HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, content_type_for(&name)))
            .insert_header((header::CACHE_CONTROL, "public, max-age=86400"))
            .body(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NotFound("File")),
        Err(e) => Err(ApiError::Internal(format!("read {}: {}", disk.display(), e))),
    }
}

fn bad_multipart(e: actix_multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Malformed form data: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_form_fields() {
        assert_eq!(classify_field("image1"), FieldKind::Image(1));
        assert_eq!(classify_field("image12"), FieldKind::Image(12));
        assert_eq!(classify_field("amenities[0]"), FieldKind::Amenity(0));
        assert_eq!(classify_field("amenities[]"), FieldKind::Amenity(usize::MAX));
        assert_eq!(classify_field("imageCaption"), FieldKind::Text);
        assert_eq!(classify_field("amenities[x]"), FieldKind::Text);
        assert_eq!(classify_field("titleEn"), FieldKind::Text);
    }

    #[test]
    fn picks_safe_extensions() {
        assert_eq!(image_extension(Some("Front Door.JPG"), Some("jpeg")), "jpg");
        assert_eq!(image_extension(Some("../../etc/passwd"), Some("png")), "png");
        assert_eq!(image_extension(None, Some("svg+xml")), "bin");
        assert_eq!(image_extension(None, None), "bin");
    }

    #[test]
    fn stored_paths_stay_inside_upload_dir() {
        assert_eq!(
            disk_path("uploads/abc.jpg", "/srv/up"),
            Some(PathBuf::from("/srv/up/abc.jpg"))
        );
        assert_eq!(disk_path("uploads/../secret", "/srv/up"), None);
        assert_eq!(disk_path("elsewhere/abc.jpg", "/srv/up"), None);
        assert!(!is_safe_name(".env"));
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("a.PNG"), "image/png");
        assert_eq!(content_type_for("a"), "application/octet-stream");
    }
}
