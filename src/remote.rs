use std::time::Duration;

use anyhow::anyhow;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::intent::{PanelRequest, Selector};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const PANEL_QUERY: &str = "query($selector:String!,$page:Int,$year:Int,$searchKeys:String,\
$forceRefresh:Boolean,$tab:String,$exclusions:[String],$extra:String){\
panel(selector:$selector,page:$page,year:$year,searchKeys:$searchKeys,\
forceRefresh:$forceRefresh,tab:$tab,exclusions:$exclusions,extra:$extra){\
displayName newItemsCount year yearRange pathPrefix queryStringFragment \
page{items{id title count}pagination{hasMore pageRange totalPages currentPage}}\
tabs{current available{name displayName}}\
exclusions{active available{id name description}}}}";

pub const GENERIC_FAILURE: &str = "something went wrong";

/// How a panel fetch can fail. Transport covers everything that kept the
/// call from completing; Protocol means the server answered with structured
/// errors instead of data.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("panel request failed: {0}")]
    Transport(anyhow::Error),
    #[error("{message}")]
    Protocol { message: String },
}

impl FetchError {
    /// Text suitable for a user-facing notification.
    pub fn notice(&self) -> &str {
        match self {
            FetchError::Transport(_) => GENERIC_FAILURE,
            FetchError::Protocol { message } => {
                if message.trim().is_empty() {
                    GENERIC_FAILURE
                } else {
                    message
                }
            }
        }
    }
}

pub trait PanelService: Send + Sync {
    fn fetch(&self, request: &PanelRequest) -> Result<PanelViewModel, FetchError>;
}

/// Everything one fetch yields; consumed by a single render pass and then
/// discarded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelViewModel {
    pub display_name: String,
    #[serde(default)]
    pub new_items_count: i64,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub year_range: Option<Vec<i32>>,
    pub path_prefix: String,
    #[serde(default)]
    pub query_string_fragment: Option<String>,
    pub page: ItemPage,
    #[serde(default)]
    pub tabs: Option<TabSet>,
    #[serde(default)]
    pub exclusions: Option<ExclusionMeta>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPage {
    #[serde(default)]
    pub items: Vec<ItemSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub has_more: bool,
    #[serde(default)]
    pub page_range: Vec<u32>,
    pub total_pages: u32,
    pub current_page: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSet {
    pub current: String,
    #[serde(default)]
    pub available: Vec<TabMeta>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabMeta {
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionMeta {
    #[serde(default)]
    pub active: Vec<String>,
    #[serde(default)]
    pub available: Vec<ExclusionCategory>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    endpoint: Url,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'static str,
    variables: &'a PanelRequest,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<EnvelopeData>,
    #[serde(default)]
    errors: Vec<WireError>,
}

#[derive(Deserialize)]
struct EnvelopeData {
    panel: PanelViewModel,
}

#[derive(Deserialize)]
struct WireError {
    #[serde(default)]
    message: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !config.user_agent.trim().is_empty(),
            "panel client user agent required"
        );
        let endpoint = Url::parse(&config.endpoint)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(DEFAULT_TIMEOUT))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            endpoint,
        })
    }
}

impl PanelService for Client {
    fn fetch(&self, request: &PanelRequest) -> Result<PanelViewModel, FetchError> {
        let body = QueryBody {
            query: PANEL_QUERY,
            variables: request,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(USER_AGENT, &self.user_agent)
            .json(&body)
            .send()
            .map_err(|err| FetchError::Transport(err.into()))?
            .error_for_status()
            .map_err(|err| FetchError::Transport(err.into()))?;

        let envelope: Envelope = response
            .json()
            .map_err(|err| FetchError::Transport(err.into()))?;

        if let Some(error) = envelope.errors.into_iter().next() {
            return Err(FetchError::Protocol {
                message: error.message,
            });
        }

        envelope
            .data
            .map(|data| data.panel)
            .ok_or_else(|| FetchError::Protocol {
                message: GENERIC_FAILURE.to_string(),
            })
    }
}

/// Canned responses for running without a server and for tests.
#[derive(Default)]
pub struct MockPanelService;

impl PanelService for MockPanelService {
    fn fetch(&self, request: &PanelRequest) -> Result<PanelViewModel, FetchError> {
        Ok(sample_view_model(request))
    }
}

pub fn sample_view_model(request: &PanelRequest) -> PanelViewModel {
    let display_name = match &request.selector {
        Selector::Today => "today".to_string(),
        Selector::Popular => "popular".to_string(),
        Selector::Search => "search results".to_string(),
        Selector::History => "on this day".to_string(),
        Selector::Category(slug) => format!("#{slug}"),
    };

    let excluded = request.exclusions.clone().unwrap_or_default();
    let items = vec![
        ItemSummary {
            id: "sample-thread".into(),
            title: "sample thread".into(),
            count: 12,
        },
        ItemSummary {
            id: "quiet-thread".into(),
            title: "quiet thread".into(),
            count: 0,
        },
    ];

    let date_indexed = matches!(request.selector, Selector::History);
    PanelViewModel {
        display_name,
        new_items_count: if request.force_refresh { 0 } else { 3 },
        year: if date_indexed {
            request.year.or(Some(2021))
        } else {
            None
        },
        year_range: date_indexed.then(|| vec![2018, 2019, 2020, 2021]),
        path_prefix: "/threads/".into(),
        query_string_fragment: None,
        page: ItemPage {
            items,
            pagination: Pagination {
                has_more: true,
                page_range: vec![1, 2, 3],
                total_pages: 3,
                current_page: request.page,
            },
        },
        tabs: matches!(request.selector, Selector::Popular).then(|| TabSet {
            current: request.tab.clone().unwrap_or_else(|| "all".into()),
            available: vec![
                TabMeta {
                    name: "all".into(),
                    display_name: "all".into(),
                },
                TabMeta {
                    name: "following".into(),
                    display_name: "following".into(),
                },
            ],
        }),
        exclusions: matches!(request.selector, Selector::Popular).then(|| ExclusionMeta {
            active: excluded,
            available: vec![
                ExclusionCategory {
                    id: "music".into(),
                    name: "music".into(),
                    description: "threads about music".into(),
                },
                ExclusionCategory {
                    id: "sports".into(),
                    name: "sports".into(),
                    description: "threads about sports".into(),
                },
            ],
        }),
    }
}

/// A service that always fails; used where a client could not be built.
pub struct UnavailableService;

impl PanelService for UnavailableService {
    fn fetch(&self, _request: &PanelRequest) -> Result<PanelViewModel, FetchError> {
        Err(FetchError::Transport(anyhow!("panel service unavailable")))
    }
}
