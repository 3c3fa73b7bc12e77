//! Chat request assembly
//!
//! Builds the `[system, user]` message pair for one analysis call. The
//! system message pins the legal framework and the exact result schema;
//! the user message inlines sanitized, truncated file text plus the free
//! description. Nothing here performs I/O.

use crate::attach::FileAttachment;
use crate::sanitize::{sanitize_text, truncate_middle};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Per-file character budget after sanitization. Kept low because large
/// payloads are the leading cause of gateway 500s.
pub const MAX_FILE_CHARS: usize = 6000;

/// Fixed compliance instruction. The output contract (JSON array, length
/// equal to the file count) is restated in the user message per request.
pub const SYSTEM_INSTRUCTION: &str = r#"
你是一个世界级的"AutoGLM 隐私合规智检"引擎。你的任务是根据用户提供的操作描述或上传的文件内容，判断是否触及隐私红线。

## 核心准则
1. **适用法律**：仅基于中国现行《个人信息保护法》(PIPL)、《数据安全法》(DSL)、《网络安全法》(CSL) 及国标 GB/T 35273。
2. **多文件处理**：如果用户上传了多个文件（通常代表不同 App 的隐私政策或业务文档），请**分别**对每个文件进行独立的合规分析，不要合并结果。**输出数组的长度必须严格等于输入文件的数量**。
3. **判断逻辑**：
   - 涉及敏感个人信息（生物识别、金融账户、行踪轨迹等）未授权采集为"高风险"。
   - 违反最小必要原则为"中/高风险"。
   - 仅仅是通用操作且合规则为"低风险"。

## 输出 JSON 结构定义
必须返回一个 **JSON 数组**，数组中的每个对象对应一个分析结果：

[
  {
    "sourceName": "string", // 被分析的文件名或App名称。必须准确对应输入文件的名称。
    "hit": boolean, // true 表示触碰红线/存在风险，false 表示合规
    "article": "string", // 例如：个人信息保护法 第六条
    "quote": "string", // 条款原文，不超过30字
    "reason": "string", // 一句话解释，简明扼要
    "riskLevel": "high" | "medium" | "low",
    "风险等级": "高" | "中" | "低",
    "industryRef": {
      "consentRate": "string", // 例如：≥95%（金融类 App 行业均值）
      "maxCollect": "string", // 例如：≤5 类敏感信息
      "anonMask": "string", // 例如：IMEI 前 8 位掩码
      "retention": "string" // 例如：≤90 天
    },
    "suggest": ["string", "string", "string"] // 3条具体建议
  }
]

请确保行业参考数据 (industryRef) 看起来专业、具体，符合当前中国移动互联网合规现状。
如果用户输入的是 URL 链接，请尝试基于你已有的知识库分析该链接对应的隐私政策内容。
"#;

/// One role-tagged message of a chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Reject empty submissions before anything is composed or sent.
pub fn ensure_input(text: &str, files: &[FileAttachment]) -> Result<()> {
    if text.trim().is_empty() && files.is_empty() {
        bail!("Nothing to analyze: provide at least one file or a text description");
    }
    Ok(())
}

/// Build the `[system, user]` message pair for one analysis request.
pub fn compose_messages(text: &str, files: &[FileAttachment]) -> Vec<ChatMessage> {
    let mut user_content = String::new();

    if !files.is_empty() {
        user_content.push_str("【待检测文件列表】\n");

        for (index, file) in files.iter().enumerate() {
            if file.is_text() {
                let file_text = match file.decoded_text() {
                    Some(decoded) => decoded,
                    None => {
                        eprintln!(
                            "  Warning: could not decode stored payload for {}",
                            file.name
                        );
                        String::new()
                    }
                };
                let file_text = sanitize_text(&file_text);
                let file_text = truncate_middle(&file_text, MAX_FILE_CHARS);

                if file_text.trim().is_empty() {
                    user_content.push_str(&format!(
                        "\n--- 文件 {}: {} ---\n(文件内容解析为空)\n----------------\n",
                        index + 1,
                        file.name
                    ));
                } else {
                    user_content.push_str(&format!(
                        "\n--- 文件 {}: {} ---\n{}\n----------------\n",
                        index + 1,
                        file.name,
                        file_text
                    ));
                }
            } else {
                user_content.push_str(&format!(
                    "\n--- 文件 {}: {} ---\n(非文本文件，暂不支持内容解析，请仅参考文件名)\n",
                    index + 1,
                    file.name
                ));
            }
        }

        user_content.push_str(&format!(
            "\n本次请求共包含 {} 个文件，请严格按照系统指令要求，输出包含 {} 个结果的 JSON 数组。\n\n",
            files.len(),
            files.len()
        ));
    }

    let described = sanitize_text(text);
    user_content.push_str("【用户补充描述】\n");
    if described.trim().is_empty() {
        user_content.push_str("无");
    } else {
        user_content.push_str(&described);
    }

    vec![
        ChatMessage::system(SYSTEM_INSTRUCTION),
        ChatMessage::user(user_content),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;

    fn text_attachment(name: &str, content: &str) -> FileAttachment {
        FileAttachment {
            name: name.to_string(),
            mime_type: "text/plain".to_string(),
            size_bytes: content.len() as u64,
            payload: BASE64.encode(content.as_bytes()),
        }
    }

    fn pdf_attachment(name: &str) -> FileAttachment {
        FileAttachment {
            name: name.to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 1024,
            payload: String::new(),
        }
    }

    #[test]
    fn test_empty_submission_rejected() {
        assert!(ensure_input("", &[]).is_err());
        assert!(ensure_input("   \n", &[]).is_err());
        assert!(ensure_input("collect location data", &[]).is_ok());
        assert!(ensure_input("", &[text_attachment("a.txt", "x")]).is_ok());
    }

    #[test]
    fn test_message_order_and_roles() {
        let messages = compose_messages("采集用户剪切板", &[]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, SYSTEM_INSTRUCTION);
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn test_each_file_gets_numbered_named_section() {
        let files = vec![
            text_attachment("wechat.txt", "隐私政策正文"),
            text_attachment("meituan.txt", "用户协议正文"),
            text_attachment("douyin.txt", "SDK 清单"),
        ];
        let messages = compose_messages("", &files);
        let body = &messages[1].content;

        assert!(body.contains("--- 文件 1: wechat.txt ---"));
        assert!(body.contains("--- 文件 2: meituan.txt ---"));
        assert!(body.contains("--- 文件 3: douyin.txt ---"));
        assert_eq!(body.matches("--- 文件 ").count(), 3);
        assert!(body.contains("本次请求共包含 3 个文件"));
        assert!(body.contains("输出包含 3 个结果的 JSON 数组"));
    }

    #[test]
    fn test_non_text_file_is_name_only() {
        let files = vec![pdf_attachment("contract.pdf")];
        let body = &compose_messages("", &files)[1].content;

        assert!(body.contains("--- 文件 1: contract.pdf ---"));
        assert!(body.contains("非文本文件"));
    }

    #[test]
    fn test_empty_after_cleaning_gets_placeholder() {
        let files = vec![text_attachment("blank.txt", "\u{0000}\u{0001}  ")];
        let body = &compose_messages("", &files)[1].content;

        assert!(body.contains("(文件内容解析为空)"));
    }

    #[test]
    fn test_long_file_is_truncated_in_place() {
        let long: String = "条".repeat(10_000);
        let files = vec![text_attachment("long.txt", &long)];
        let body = &compose_messages("", &files)[1].content;

        assert!(body.contains("字已省略"));
        // the full 10k chars must not have been inlined
        assert!(body.chars().count() < 8000);
    }

    #[test]
    fn test_empty_text_becomes_placeholder() {
        let files = vec![text_attachment("a.txt", "content")];
        let body = &compose_messages("", &files)[1].content;
        assert!(body.contains("【用户补充描述】\n无"));
    }

    #[test]
    fn test_user_text_is_sanitized_not_truncated() {
        let text = format!("描述\u{0002}开始 {}", "长".repeat(9000));
        let body = &compose_messages(&text, &[])[1].content;

        assert!(!body.contains('\u{0002}'));
        assert!(!body.contains("字已省略"));
        assert!(body.contains(&"长".repeat(9000)));
    }
}
