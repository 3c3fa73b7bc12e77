//! Compliance verdict types and terminal rendering
//!
//! The wire schema mirrors what the system instruction demands from the
//! model, camelCase keys included. Every field defaults so a sloppy but
//! structurally sound answer still renders instead of failing the run.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    #[default]
    Low,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
        }
    }

    /// Localized label matching the 风险等级 mirror field.
    pub fn localized(&self) -> &'static str {
        match self {
            RiskLevel::High => "高",
            RiskLevel::Medium => "中",
            RiskLevel::Low => "低",
        }
    }
}

/// Industry reference figures the model is asked to include per verdict.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryRef {
    #[serde(default)]
    pub consent_rate: String,
    #[serde(default)]
    pub max_collect: String,
    #[serde(default)]
    pub anon_mask: String,
    #[serde(default)]
    pub retention: String,
}

/// One analyzed source's verdict, as returned by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceResult {
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub hit: bool,
    #[serde(default)]
    pub article: String,
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// Localized mirror of `risk_level`, filled by the model.
    #[serde(rename = "风险等级", default)]
    pub risk_label: String,
    #[serde(default)]
    pub industry_ref: IndustryRef,
    #[serde(default)]
    pub suggest: Vec<String>,
}

impl ComplianceResult {
    /// Localized risk label, falling back to the enum when the mirror
    /// field came back empty.
    pub fn risk_display(&self) -> &str {
        if self.risk_label.is_empty() {
            self.risk_level.localized()
        } else {
            &self.risk_label
        }
    }
}

/// Print one verdict card per result.
pub fn render_results(results: &[ComplianceResult]) {
    println!();
    for (index, result) in results.iter().enumerate() {
        let verdict = if result.hit { "触碰红线" } else { "合规" };
        println!("────────────────────────────────────────────────────────");
        println!(
            "  {}. {}  [{}]  risk: {} ({})",
            index + 1,
            result.source_name,
            verdict,
            result.risk_level.as_str(),
            result.risk_display()
        );
        if !result.article.is_empty() {
            println!("     Article: {}", result.article);
        }
        if !result.quote.is_empty() {
            println!("     Quote:   {}", result.quote);
        }
        if !result.reason.is_empty() {
            println!("     Reason:  {}", result.reason);
        }

        let industry = &result.industry_ref;
        if !industry.consent_rate.is_empty()
            || !industry.max_collect.is_empty()
            || !industry.anon_mask.is_empty()
            || !industry.retention.is_empty()
        {
            println!(
                "     Industry: 授权率 {} | 采集 {} | 脱敏 {} | 留存 {}",
                industry.consent_rate, industry.max_collect, industry.anon_mask, industry.retention
            );
        }

        if !result.suggest.is_empty() {
            println!("     Suggestions:");
            for (i, suggestion) in result.suggest.iter().enumerate() {
                println!("       {}. {}", i + 1, suggestion);
            }
        }
    }
    println!("────────────────────────────────────────────────────────");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "sourceName": "wechat_policy.txt",
        "hit": true,
        "article": "个人信息保护法 第六条",
        "quote": "收集个人信息，应当限于实现处理目的的最小范围",
        "reason": "超范围收集剪切板内容",
        "riskLevel": "high",
        "风险等级": "高",
        "industryRef": {
            "consentRate": "≥95%（社交类 App 行业均值）",
            "maxCollect": "≤5 类敏感信息",
            "anonMask": "IMEI 前 8 位掩码",
            "retention": "≤90 天"
        },
        "suggest": ["停止采集剪切板", "补充单独同意弹窗", "更新隐私政策条款"]
    }"#;

    #[test]
    fn test_deserialize_full_verdict() {
        let result: ComplianceResult = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(result.source_name, "wechat_policy.txt");
        assert!(result.hit);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(result.risk_label, "高");
        assert_eq!(result.industry_ref.retention, "≤90 天");
        assert_eq!(result.suggest.len(), 3);
    }

    #[test]
    fn test_sparse_verdict_uses_defaults() {
        let result: ComplianceResult =
            serde_json::from_str(r#"{"sourceName": "a.txt", "hit": false}"#).unwrap();
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(result.suggest.is_empty());
        assert!(result.industry_ref.consent_rate.is_empty());
    }

    #[test]
    fn test_risk_display_falls_back_to_enum() {
        let mut result: ComplianceResult =
            serde_json::from_str(r#"{"riskLevel": "medium"}"#).unwrap();
        assert_eq!(result.risk_display(), "中");

        result.risk_label = "中风险".to_string();
        assert_eq!(result.risk_display(), "中风险");
    }

    #[test]
    fn test_risk_level_labels() {
        assert_eq!(RiskLevel::High.as_str(), "high");
        assert_eq!(RiskLevel::High.localized(), "高");
        assert_eq!(RiskLevel::Low.localized(), "低");
    }
}
