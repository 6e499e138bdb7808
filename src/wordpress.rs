//! WordPress REST API client.
//!
//! Thin wrapper over the `wp-json/wp/v2` endpoints the pipeline uses:
//! post creation, media upload, category and tag management, and a
//! latest-post lookup for the ping broadcast. Authentication is HTTP
//! Basic with an application password.
//!
//! SEO meta fields are written for the three common plugin families
//! (Yoast, Rank Math, All in One SEO) so whichever one the target site
//! runs picks them up.

use crate::utils::truncate_for_log;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Reference to a created post.
#[derive(Debug, Clone, Deserialize)]
pub struct PostRef {
    pub id: u64,
    #[serde(default)]
    pub link: String,
}

/// Reference to an uploaded media attachment.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaRef {
    pub id: u64,
    #[serde(default)]
    pub source_url: String,
}

#[derive(Debug, Deserialize)]
struct Category {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Tag {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RenderedField {
    #[serde(default)]
    rendered: String,
}

#[derive(Debug, Deserialize)]
struct PostSummary {
    #[serde(default)]
    link: String,
    title: Option<RenderedField>,
}

/// Title and link of the most recent published post.
#[derive(Debug, Clone)]
pub struct LatestPost {
    pub title: String,
    pub link: String,
}

/// SEO fields attached to a post for the supported plugin families.
#[derive(Debug, Clone, Default)]
pub struct SeoFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
}

/// Everything needed to create one post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub html_body: String,
    /// `draft` or `publish`.
    pub status: String,
    pub categories: Vec<u64>,
    pub tags: Vec<u64>,
    pub featured_media: Option<u64>,
    pub excerpt: Option<String>,
    pub seo: SeoFields,
}

/// Client bound to one WordPress site.
#[derive(Debug, Clone)]
pub struct WordPressClient {
    http: reqwest::Client,
    api_base: Url,
    auth_header: String,
}

impl WordPressClient {
    /// Build a client for `site_url` using Basic auth with an
    /// application password.
    pub fn new(site_url: &str, username: &str, app_password: &str) -> Result<Self, Box<dyn Error>> {
        let base = Url::parse(&format!("{}/wp-json/wp/v2/", site_url.trim_end_matches('/')))?;
        let token = BASE64.encode(format!("{username}:{app_password}"));
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("gadget_press/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_base: base,
            auth_header: format!("Basic {token}"),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, Box<dyn Error>> {
        Ok(self.api_base.join(path)?)
    }

    /// Create a post. Rejections surface the response status and body so
    /// the scheduler log shows why WordPress said no.
    #[instrument(level = "info", skip_all, fields(title = %post.title, status = %post.status))]
    pub async fn create_post(&self, post: &NewPost) -> Result<PostRef, Box<dyn Error>> {
        let mut body = serde_json::json!({
            "title": post.title,
            "content": post.html_body,
            "status": post.status,
        });
        if !post.categories.is_empty() {
            body["categories"] = serde_json::json!(post.categories);
        }
        if !post.tags.is_empty() {
            body["tags"] = serde_json::json!(post.tags);
        }
        if let Some(media_id) = post.featured_media {
            body["featured_media"] = serde_json::json!(media_id);
        }
        if let Some(excerpt) = &post.excerpt {
            body["excerpt"] = serde_json::json!(excerpt);
        }
        if let Some(meta) = seo_meta(&post.seo) {
            body["meta"] = meta;
        }

        let response = self
            .http
            .post(self.endpoint("posts")?)
            .header("Authorization", &self.auth_header)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(format!(
                "post creation rejected: http {status}: {}",
                truncate_for_log(&raw, 300)
            )
            .into());
        }

        let created: PostRef = serde_json::from_str(&raw)?;
        info!(post_id = created.id, link = %created.link, "Created post");
        Ok(created)
    }

    /// Download an image and re-upload it to the media library.
    #[instrument(level = "info", skip_all, fields(%image_url, %filename))]
    pub async fn upload_media(
        &self,
        image_url: &str,
        filename: &str,
    ) -> Result<MediaRef, Box<dyn Error>> {
        let image = self.http.get(image_url).send().await?.error_for_status()?;
        let content_type = image
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = image.bytes().await?;
        debug!(bytes = bytes.len(), %content_type, "Downloaded source image");

        let response = self
            .http
            .post(self.endpoint("media")?)
            .header("Authorization", &self.auth_header)
            .header("Content-Type", content_type)
            .header(
                "Content-Disposition",
                format!("attachment; filename=\"{filename}\""),
            )
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(format!(
                "media upload rejected: http {status}: {}",
                truncate_for_log(&raw, 300)
            )
            .into());
        }

        let media: MediaRef = serde_json::from_str(&raw)?;
        info!(media_id = media.id, url = %media.source_url, "Uploaded featured image");
        Ok(media)
    }

    async fn get_categories(&self) -> Result<Vec<Category>, Box<dyn Error>> {
        let response = self
            .http
            .get(self.endpoint("categories")?)
            .query(&[("per_page", "100")])
            .header("Authorization", &self.auth_header)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn create_category(&self, name: &str) -> Result<Category, Box<dyn Error>> {
        let response = self
            .http
            .post(self.endpoint("categories")?)
            .header("Authorization", &self.auth_header)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Find a category by name (case-insensitive) or create it.
    pub async fn get_or_create_category(&self, name: &str) -> Result<u64, Box<dyn Error>> {
        let categories = self.get_categories().await?;
        if let Some(existing) = categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
        {
            debug!(category = name, id = existing.id, "Category already exists");
            return Ok(existing.id);
        }
        let created = self.create_category(name).await?;
        info!(category = name, id = created.id, "Created category");
        Ok(created.id)
    }

    async fn get_tags(&self) -> Result<Vec<Tag>, Box<dyn Error>> {
        let response = self
            .http
            .get(self.endpoint("tags")?)
            .query(&[("per_page", "100")])
            .header("Authorization", &self.auth_header)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn create_tag(&self, name: &str) -> Result<Tag, Box<dyn Error>> {
        let response = self
            .http
            .post(self.endpoint("tags")?)
            .header("Authorization", &self.auth_header)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Resolve tag names to ids, creating any that are missing.
    pub async fn get_or_create_tags(&self, names: &[String]) -> Result<Vec<u64>, Box<dyn Error>> {
        let existing = self.get_tags().await?;
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            match existing.iter().find(|t| t.name.eq_ignore_ascii_case(name)) {
                Some(tag) => ids.push(tag.id),
                None => {
                    let created = self.create_tag(name).await?;
                    info!(tag = %name, id = created.id, "Created tag");
                    ids.push(created.id);
                }
            }
        }
        Ok(ids)
    }

    /// Fetch the most recent published post without authentication.
    ///
    /// Used by the ping broadcast, which runs without site credentials.
    /// Any failure degrades to `None` with a warning.
    pub async fn latest_public_post(http: &reqwest::Client, site_url: &str) -> Option<LatestPost> {
        let url = format!(
            "{}/wp-json/wp/v2/posts",
            site_url.trim_end_matches('/')
        );
        let result = async {
            let posts: Vec<PostSummary> = http
                .get(&url)
                .query(&[
                    ("per_page", "1"),
                    ("orderby", "date"),
                    ("order", "desc"),
                    ("status", "publish"),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok::<_, Box<dyn Error>>(posts)
        }
        .await;

        match result {
            Ok(posts) => posts.into_iter().next().map(|p| LatestPost {
                title: p.title.map(|t| t.rendered).unwrap_or_default(),
                link: p.link,
            }),
            Err(e) => {
                warn!(error = %e, "Could not fetch latest post");
                None
            }
        }
    }
}

/// Build the `meta` object covering Yoast, Rank Math, and AIOSEO keys.
fn seo_meta(seo: &SeoFields) -> Option<serde_json::Value> {
    if seo.title.is_none() && seo.description.is_none() && seo.keywords.is_none() {
        return None;
    }
    let mut meta = serde_json::Map::new();
    if let Some(title) = &seo.title {
        for key in ["_yoast_wpseo_title", "rank_math_title", "_aioseo_title"] {
            meta.insert(key.to_string(), serde_json::json!(title));
        }
    }
    if let Some(description) = &seo.description {
        for key in [
            "_yoast_wpseo_metadesc",
            "rank_math_description",
            "_aioseo_description",
        ] {
            meta.insert(key.to_string(), serde_json::json!(description));
        }
    }
    if let Some(keywords) = &seo.keywords {
        for key in [
            "_yoast_wpseo_focuskw",
            "rank_math_focus_keyword",
            "_aioseo_keywords",
        ] {
            meta.insert(key.to_string(), serde_json::json!(keywords));
        }
    }
    Some(serde_json::Value::Object(meta))
}
