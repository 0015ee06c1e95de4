//! Public book-metadata API client.
//!
//! Free-text search and volume lookup against the volumes endpoint; results
//! are cached by the coordinator, never here.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::application::sources::BooksSource;
use crate::domain::entities::{BookSummary, BookVolumeRecord};
use crate::infra::error::RemoteError;

const SEARCH_LIMIT: u32 = 25;

#[derive(Clone)]
pub struct BooksClient {
    client: Client,
    base: Url,
}

impl BooksClient {
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        let base = Url::parse(base_url)?.join("/")?;
        let client = Client::builder()
            .user_agent(concat!("bookworm-data/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if status.as_u16() == 404 {
            return Err(RemoteError::NotFound);
        }
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| RemoteError::malformed(format!("failed to parse volume body: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponseDto {
    #[serde(default)]
    items: Vec<VolumeDto>,
}

#[derive(Debug, Deserialize)]
struct VolumeDto {
    id: String,
    #[serde(rename = "volumeInfo")]
    volume_info: VolumeInfoDto,
}

#[derive(Debug, Deserialize, Default)]
struct VolumeInfoDto {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    description: Option<String>,
    #[serde(rename = "imageLinks")]
    image_links: Option<ImageLinksDto>,
    #[serde(rename = "pageCount")]
    page_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ImageLinksDto {
    thumbnail: Option<String>,
    #[serde(rename = "smallThumbnail")]
    small_thumbnail: Option<String>,
}

impl VolumeDto {
    fn into_record(self) -> Result<BookVolumeRecord, RemoteError> {
        let title = self
            .volume_info
            .title
            .ok_or_else(|| RemoteError::malformed(format!("volume `{}` has no title", self.id)))?;
        let thumbnail_url = self
            .volume_info
            .image_links
            .and_then(|links| links.thumbnail.or(links.small_thumbnail));
        Ok(BookVolumeRecord {
            volume_id: self.id,
            title,
            authors: self.volume_info.authors,
            description: self.volume_info.description,
            thumbnail_url,
            page_count: self.volume_info.page_count,
        })
    }

    fn into_summary(self) -> Result<BookSummary, RemoteError> {
        let record = self.into_record()?;
        Ok(BookSummary {
            volume_id: record.volume_id,
            title: record.title,
            authors: record.authors,
            thumbnail_url: record.thumbnail_url,
        })
    }
}

#[async_trait]
impl BooksSource for BooksClient {
    async fn search(&self, query: &str) -> Result<Vec<BookSummary>, RemoteError> {
        let mut url = self.base.join("volumes")?;
        url.query_pairs_mut()
            .append_pair("q", query.trim())
            .append_pair("maxResults", &SEARCH_LIMIT.to_string());

        let resp: SearchResponseDto = self.get_json(url).await?;
        resp.items
            .into_iter()
            .map(VolumeDto::into_summary)
            .collect()
    }

    async fn volume(&self, volume_id: &str) -> Result<BookVolumeRecord, RemoteError> {
        let url = self.base.join(&format!("volumes/{volume_id}"))?;
        let dto: VolumeDto = self.get_json(url).await?;
        dto.into_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_dto_prefers_full_thumbnail() {
        let dto = VolumeDto {
            id: "v1".to_string(),
            volume_info: VolumeInfoDto {
                title: Some("Dune".to_string()),
                authors: vec!["Frank Herbert".to_string()],
                description: None,
                image_links: Some(ImageLinksDto {
                    thumbnail: Some("http://example/full".to_string()),
                    small_thumbnail: Some("http://example/small".to_string()),
                }),
                page_count: Some(412),
            },
        };

        let record = dto.into_record().expect("valid volume");
        assert_eq!(record.thumbnail_url.as_deref(), Some("http://example/full"));
        assert_eq!(record.page_count, Some(412));
    }

    #[test]
    fn missing_title_is_malformed() {
        let dto = VolumeDto {
            id: "v2".to_string(),
            volume_info: VolumeInfoDto::default(),
        };
        assert!(dto.into_record().is_err());
    }
}
