//! Prismic repository API client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::{self, DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer};
use url::Url;

use super::{CmsError, ContentSource};
use crate::config::CmsConfig;
use crate::content::{null_as_default, ContentBlock, PostDetail, PostSummary, PostsPage, RichTextNode};
use crate::helpers::parse_timestamp;

/// Fields projected for listing pages
const SUMMARY_FIELDS: &[&str] = &["title", "subtitle", "author"];

/// Page size used when enumerating every post
const ENUMERATE_PAGE_SIZE: usize = 100;

/// Client for a Prismic v2 repository
#[derive(Clone, Debug)]
pub struct PrismicClient {
    client: Client,
    endpoint: Url,
    access_token: Option<String>,
    document_type: String,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
struct ApiInfo {
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    id: String,
    #[serde(rename = "isMasterRef", default)]
    is_master: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse<D> {
    #[serde(default = "Vec::new")]
    results: Vec<Document<D>>,
    next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document<D> {
    uid: Option<String>,
    #[serde(default, deserialize_with = "timestamp")]
    first_publication_date: Option<DateTime<Utc>>,
    data: D,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryData {
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    subtitle: String,
    #[serde(default, deserialize_with = "null_as_default")]
    author: String,
}

#[derive(Debug, Deserialize)]
struct DetailData {
    #[serde(flatten)]
    summary: SummaryData,
    #[serde(default, deserialize_with = "null_as_default")]
    banner: Banner,
    #[serde(default, deserialize_with = "null_as_default")]
    content: Vec<RawBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct Banner {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    #[serde(default, deserialize_with = "null_as_default")]
    heading: String,
    #[serde(default, deserialize_with = "null_as_default")]
    body: Vec<RichTextNode>,
}

fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp {:?}", raw))),
    }
}

fn summary(uid: String, published: Option<DateTime<Utc>>, data: SummaryData) -> PostSummary {
    PostSummary {
        uid,
        first_publication_date: published,
        title: data.title,
        subtitle: data.subtitle,
        author: data.author,
    }
}

impl SearchResponse<SummaryData> {
    fn into_page(self) -> PostsPage {
        let results = self
            .results
            .into_iter()
            .filter_map(|doc| match doc.uid {
                Some(uid) => Some(summary(uid, doc.first_publication_date, doc.data)),
                None => {
                    tracing::warn!("Skipping document without uid");
                    None
                }
            })
            .collect();

        PostsPage {
            results,
            next_page: self.next_page,
        }
    }
}

impl Document<DetailData> {
    fn into_detail(self, requested_uid: &str) -> PostDetail {
        let uid = self.uid.unwrap_or_else(|| requested_uid.to_string());
        PostDetail {
            summary: summary(uid, self.first_publication_date, self.data.summary),
            banner_url: self.data.banner.url.unwrap_or_default(),
            content: self
                .data
                .content
                .into_iter()
                .map(|block| ContentBlock {
                    heading: block.heading,
                    body: block.body,
                })
                .collect(),
        }
    }
}

/// Quote a value for use inside a predicate
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

impl PrismicClient {
    pub fn new(config: &CmsConfig) -> Result<Self, CmsError> {
        let endpoint = Url::parse(config.endpoint.trim_end_matches('/'))?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self {
            client,
            endpoint,
            access_token: config.access_token.clone(),
            document_type: config.document_type.clone(),
            page_size: config.page_size,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("spacetraveling/", env!("CARGO_PKG_VERSION"))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CmsError> {
        tracing::debug!("GET {}", url);
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CmsError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| CmsError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// The ref every query must be pinned to
    async fn master_ref(&self) -> Result<String, CmsError> {
        let mut url = self.endpoint.clone();
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        let api: ApiInfo = self.get_json(url).await?;
        api.refs
            .into_iter()
            .find(|r| r.is_master)
            .map(|r| r.id)
            .ok_or(CmsError::NoMasterRef)
    }

    fn search_url(
        &self,
        master_ref: &str,
        predicates: &[String],
        page_size: usize,
        fetch: &[&str],
    ) -> Result<Url, CmsError> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/documents/search", base))?;
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("ref", master_ref);
            qp.append_pair("q", &format!("[{}]", predicates.concat()));
            qp.append_pair("pageSize", &page_size.to_string());
            if !fetch.is_empty() {
                let fields: Vec<String> = fetch
                    .iter()
                    .map(|f| format!("{}.{}", self.document_type, f))
                    .collect();
                qp.append_pair("fetch", &fields.join(","));
            }
            if let Some(token) = &self.access_token {
                qp.append_pair("access_token", token);
            }
        }
        Ok(url)
    }

    fn type_predicate(&self) -> String {
        format!("[at(document.type,{})]", quote(&self.document_type))
    }

    fn uid_predicate(&self, uid: &str) -> String {
        format!("[at(my.{}.uid,{})]", self.document_type, quote(uid))
    }
}

#[async_trait]
impl ContentSource for PrismicClient {
    async fn first_page(&self) -> Result<PostsPage, CmsError> {
        let master_ref = self.master_ref().await?;
        let url = self.search_url(
            &master_ref,
            &[self.type_predicate()],
            self.page_size,
            SUMMARY_FIELDS,
        )?;
        let response: SearchResponse<SummaryData> = self.get_json(url).await?;
        Ok(response.into_page())
    }

    async fn page_at(&self, cursor: &str) -> Result<PostsPage, CmsError> {
        let url = Url::parse(cursor)?;
        let response: SearchResponse<SummaryData> = self.get_json(url).await?;
        Ok(response.into_page())
    }

    async fn post_by_uid(&self, uid: &str) -> Result<PostDetail, CmsError> {
        let master_ref = self.master_ref().await?;
        let url = self.search_url(
            &master_ref,
            &[self.type_predicate(), self.uid_predicate(uid)],
            1,
            &[],
        )?;
        let response: SearchResponse<DetailData> = self.get_json(url).await?;
        response
            .results
            .into_iter()
            .next()
            .map(|doc| doc.into_detail(uid))
            .ok_or_else(|| CmsError::NotFound {
                document_type: self.document_type.clone(),
                uid: uid.to_string(),
            })
    }

    async fn all_uids(&self) -> Result<Vec<String>, CmsError> {
        let master_ref = self.master_ref().await?;
        let mut next = Some(self.search_url(
            &master_ref,
            &[self.type_predicate()],
            ENUMERATE_PAGE_SIZE,
            &["title"],
        )?);

        let mut uids = Vec::new();
        while let Some(url) = next.take() {
            let response: SearchResponse<IgnoredAny> = self.get_json(url).await?;
            uids.extend(response.results.into_iter().filter_map(|doc| doc.uid));
            next = response.next_page.as_deref().map(Url::parse).transpose()?;
        }

        Ok(uids)
    }
}
