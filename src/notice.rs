//! Compliance notice feed
//!
//! Surfaces recent law/leak/terms-of-service news from a public feed,
//! merges in simulated policy-monitoring warnings for tracked apps, and
//! falls back to a built-in list when the feed is unreachable. Purely
//! informational; a failed fetch never fails the caller.

use crate::config::ModelConfig;
use crate::resolve;
use crate::util::truncate;
use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

const FEED_TIMEOUT: Duration = Duration::from_secs(10);

/// Never hand back fewer than this many notices; pad from the built-ins.
const MIN_NOTICES: usize = 3;

/// Tracked applications and their primary policy pages, used for the
/// simulated monitoring warnings.
const TRACKED_APPS: &[(&str, &str)] = &[
    ("微信", "https://weixin.qq.com/cgi-bin/readtemplate?lang=zh_CN&t=weixin_agreement&s=privacy"),
    ("美团", "https://www.meituan.com/about/privacy"),
    ("淘宝", "https://rulechannel.taobao.com/index.htm"),
    ("京东", "https://about.jd.com/privacy/"),
    ("抖音", "https://www.douyin.com/draft/douyin_agreement/"),
    ("小红书", "https://www.xiaohongshu.com/protocols/privacy_policy"),
    ("哔哩哔哩", "https://www.bilibili.com/protocal/privacy"),
    ("快手", "https://www.kuaishou.com/privacy"),
    ("支付宝", "https://render.alipay.com/p/c/k2cx0tg8"),
    ("高德地图", "https://lbs.amap.com/home/privacy/"),
    ("网易云音乐", "https://music.163.com/html/m3_privacy/"),
    ("拼多多", "https://mobile.yangkeduo.com/privacy_policy.html"),
];

const UPDATE_KINDS: &[&str] = &[
    "隐私政策更新",
    "第三方SDK列表更新",
    "个人信息收集规则变更",
    "注销流程优化",
];

/// Sample revisions for the deep-analysis demonstration path.
const OLD_POLICY_SAMPLE: &str = "\
1. 我们会收集您的位置信息用于提供导航服务。
2. 我们会与第三方合作伙伴共享您的订单信息以完成配送。
3. 我们采取严格的安全措施保护您的个人信息。
";

const NEW_POLICY_SAMPLE: &str = "\
1. 我们会收集您的位置信息用于提供导航服务。
2. 我们会与第三方合作伙伴共享您的订单信息以完成配送。
3. 新增：为了提供更好的个性化推荐，我们会收集您的剪切板信息。
4. 我们采取严格的安全措施保护您的个人信息。
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Law,
    Leak,
    Tos,
}

impl NoticeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NoticeKind::Law => "法规",
            NoticeKind::Leak => "泄露",
            NoticeKind::Tos => "条款",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticePriority {
    High,
    Medium,
    Low,
}

impl NoticePriority {
    pub fn label(&self) -> &'static str {
        match self {
            NoticePriority::High => "high",
            NoticePriority::Medium => "medium",
            NoticePriority::Low => "low",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub id: String,
    pub title: String,
    pub kind: NoticeKind,
    pub date: String,
    pub priority: NoticePriority,
    pub link: Option<String>,
}

#[derive(Deserialize)]
struct FeedResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    items: Vec<FeedItem>,
}

#[derive(Deserialize)]
struct FeedItem {
    #[serde(default)]
    title: String,
    #[serde(rename = "pubDate", default)]
    pub_date: String,
    #[serde(default)]
    link: String,
}

/// Fetch the merged notice list. Never fails; the built-in list is the
/// floor. A usable model config enables the deep-analysis entry.
pub async fn fetch_latest(config: Option<&ModelConfig>) -> Vec<Notice> {
    let mut notices = match fetch_feed().await {
        Ok(items) => items,
        Err(err) => {
            eprintln!("  Warning: notice feed fetch failed: {}", err);
            Vec::new()
        }
    };

    // rng is scoped so the future stays Send
    let deep_roll = {
        let mut rng = rand::rng();
        for notice in simulated_updates(&mut rng).into_iter().rev() {
            notices.insert(0, notice);
        }
        rng.random::<f64>()
    };

    if let Some(config) = config {
        if !config.api_key.is_empty() && deep_roll > 0.3 {
            match resolve::compare_policies(OLD_POLICY_SAMPLE, NEW_POLICY_SAMPLE, config).await {
                Ok(analysis) => notices.insert(0, deep_analysis_notice(&analysis)),
                Err(err) => eprintln!("  Warning: policy comparison failed: {}", err),
            }
        }
    }

    if notices.is_empty() {
        return fallback_notices();
    }
    if notices.len() < MIN_NOTICES {
        let missing = MIN_NOTICES - notices.len();
        notices.extend(fallback_notices().into_iter().take(missing));
    }
    notices
}

async fn fetch_feed() -> Result<Vec<Notice>> {
    let client = reqwest::Client::builder()
        .user_agent(format!("redline-cli/{}", env!("CARGO_PKG_VERSION")))
        .timeout(FEED_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")?;

    let response: FeedResponse = client
        .get(feed_url()?)
        .send()
        .await
        .context("Feed request failed")?
        .json()
        .await
        .context("Failed to parse feed response")?;

    if response.status != "ok" {
        bail!("feed reported status '{}'", response.status);
    }

    Ok(map_items(response.items))
}

fn feed_url() -> Result<String> {
    let rss = url::Url::parse_with_params(
        "https://news.google.com/rss/search",
        &[
            ("q", "隐私合规 OR 数据安全 OR 个人信息保护 OR 网络安全法"),
            ("hl", "zh-CN"),
            ("gl", "CN"),
            ("ceid", "CN:zh-CN"),
        ],
    )
    .context("Invalid feed query")?;

    let wrapped = url::Url::parse_with_params(
        "https://api.rss2json.com/v1/api.json",
        &[("rss_url", rss.as_str())],
    )
    .context("Invalid feed wrapper URL")?;

    Ok(wrapped.into())
}

fn map_items(items: Vec<FeedItem>) -> Vec<Notice> {
    items
        .into_iter()
        .filter(|item| !item.title.trim().is_empty())
        .map(|item| Notice {
            id: format!("rss-{}", Uuid::new_v4()),
            kind: determine_kind(&item.title),
            date: normalize_date(&item.pub_date),
            priority: NoticePriority::Medium,
            link: if item.link.is_empty() {
                None
            } else {
                Some(item.link)
            },
            title: item.title,
        })
        .collect()
}

fn determine_kind(title: &str) -> NoticeKind {
    if title.contains('漏') || title.contains('泄') || title.contains('攻') {
        return NoticeKind::Leak;
    }
    if title.contains("协议") || title.contains("政策") || title.contains("条款") {
        return NoticeKind::Tos;
    }
    NoticeKind::Law
}

/// Normalize feed timestamps to YYYY-MM-DD; unparseable dates become today.
fn normalize_date(raw: &str) -> String {
    // rss2json serves "2025-11-20 09:30:00"
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return dt.date().to_string();
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(raw) {
        return dt.date_naive().to_string();
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return dt.date_naive().to_string();
    }
    today()
}

fn today() -> String {
    chrono::Utc::now().date_naive().to_string()
}

/// One or two simulated "policy changed, please re-review" warnings for
/// randomly picked tracked apps.
fn simulated_updates(rng: &mut impl Rng) -> Vec<Notice> {
    let count = rng.random_range(1..=2);
    (0..count)
        .map(|_| {
            let (app, link) = TRACKED_APPS[rng.random_range(0..TRACKED_APPS.len())];
            let update_kind = UPDATE_KINDS[rng.random_range(0..UPDATE_KINDS.len())];
            Notice {
                id: format!("app-update-{}", Uuid::new_v4()),
                title: format!("【监测预警】{} {}，建议复核", app, update_kind),
                kind: NoticeKind::Tos,
                date: today(),
                priority: NoticePriority::High,
                link: Some(link.to_string()),
            }
        })
        .collect()
}

fn deep_analysis_notice(analysis: &str) -> Notice {
    Notice {
        id: format!("analysis-{}", Uuid::new_v4()),
        title: format!("【深度分析】微信隐私政策更新：{}", truncate(analysis, 23)),
        kind: NoticeKind::Tos,
        date: today(),
        priority: NoticePriority::High,
        link: Some(
            "https://weixin.qq.com/cgi-bin/readtemplate?lang=zh_CN&t=weixin_agreement&s=privacy"
                .to_string(),
        ),
    }
}

/// Built-in notices shown when no live source yields anything.
pub fn fallback_notices() -> Vec<Notice> {
    let entries: [(&str, NoticeKind, &str, NoticePriority); 7] = [
        (
            "《生成式人工智能服务安全基本要求》正式发布，明确语料合规新标准",
            NoticeKind::Law,
            "2025-11-20",
            NoticePriority::High,
        ),
        (
            "某知名电商平台发生 API 越权访问漏洞，建议立即排查同类接口",
            NoticeKind::Leak,
            "2025-11-22",
            NoticePriority::High,
        ),
        (
            "微信小程序隐私保护指引更新：新增\"剪切板\"权限调用规范",
            NoticeKind::Tos,
            "2025-11-21",
            NoticePriority::Medium,
        ),
        (
            "工信部通报 2025 年第三批侵害用户权益行为的 APP 名单",
            NoticeKind::Law,
            "2025-11-18",
            NoticePriority::High,
        ),
        (
            "抖音《隐私政策》更新，调整个性化广告推荐关闭入口",
            NoticeKind::Tos,
            "2025-11-19",
            NoticePriority::Low,
        ),
        (
            "《网络数据安全管理条例》实施细则征求意见稿发布",
            NoticeKind::Law,
            "2025-11-15",
            NoticePriority::High,
        ),
        (
            "快手更新《用户服务协议》，加强未成年人模式保护措施",
            NoticeKind::Tos,
            "2025-11-10",
            NoticePriority::Medium,
        ),
    ];

    entries
        .into_iter()
        .enumerate()
        .map(|(i, (title, kind, date, priority))| Notice {
            id: format!("builtin-{}", i + 1),
            title: title.to_string(),
            kind,
            date: date.to_string(),
            priority,
            link: None,
        })
        .collect()
}
