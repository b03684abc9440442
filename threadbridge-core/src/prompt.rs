// ABOUTME: Builds the localized prompt sent to the assistant from thread history.
// ABOUTME: Detects reply language from Unicode script ranges and localizes failure replies too.

use crate::history::{HistoryEntry, Role};
use threadbridge_agent::RunError;

/// Reply language inferred from the user's message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Korean,
    Japanese,
    Chinese,
    English,
}

impl Language {
    /// First matching script wins: Hangul, kana, CJK ideographs, Latin.
    /// Anything else falls back to English.
    pub fn detect(text: &str) -> Self {
        let has = |pred: fn(char) -> bool| text.chars().any(pred);
        if has(is_hangul) {
            Self::Korean
        } else if has(is_kana) {
            Self::Japanese
        } else if has(is_cjk_ideograph) {
            Self::Chinese
        } else {
            Self::English
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Korean => "ko",
            Self::Japanese => "ja",
            Self::Chinese => "zh",
            Self::English => "en",
        }
    }

    fn template(self) -> &'static Template {
        match self {
            Self::Korean => &KOREAN,
            Self::Japanese => &JAPANESE,
            Self::Chinese => &CHINESE,
            Self::English => &ENGLISH,
        }
    }

    /// Label used for a role inside the history section
    pub fn role_label(self, role: Role) -> &'static str {
        let t = self.template();
        match role {
            Role::User => t.user,
            Role::Assistant => t.assistant,
        }
    }

    /// First line of every failure reply
    pub fn failure_banner(self) -> &'static str {
        self.template().failure_banner
    }

    /// Short, user-facing description of a failed run
    pub fn describe_failure(self, error: &RunError) -> String {
        let t = self.template();
        match error {
            RunError::Timeout(_) => t.timeout.to_string(),
            RunError::Launch(e) => format!("{}{}", t.launch_failed, e),
            RunError::Exit { message, .. } => format!("{}{}", t.exit_failed, message),
            RunError::EmptyResponse => t.empty.to_string(),
        }
    }
}

fn is_hangul(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{30FF}').contains(&c)
}

fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

struct Template {
    intro: &'static str,
    language: &'static str,
    history_title: &'static str,
    user: &'static str,
    assistant: &'static str,
    requirements_title: &'static str,
    requirement_language: &'static str,
    requirement_concise: &'static str,
    failure_banner: &'static str,
    timeout: &'static str,
    launch_failed: &'static str,
    exit_failed: &'static str,
    empty: &'static str,
}

static KOREAN: Template = Template {
    intro: "너는 Slack에서 대화를 이어가는 Codex 어시스턴트다.",
    language: "아래 이전 맥락을 유지해서 한국어로 답해라.",
    history_title: "[대화 맥락]",
    user: "사용자",
    assistant: "어시스턴트",
    requirements_title: "요구사항:",
    requirement_language: "1) 답변은 한국어로 작성",
    requirement_concise: "2) 핵심만 간결하게 답변",
    failure_banner: "처리 중 오류가 발생했습니다.",
    timeout: "응답 생성이 시간 초과되었습니다. 잠시 후 다시 시도해 주세요.",
    launch_failed: "Codex 실행 실패: ",
    exit_failed: "Codex 실행 오류: ",
    empty: "응답이 비어 있습니다. 다시 시도해 주세요.",
};

static ENGLISH: Template = Template {
    intro: "You are a Codex assistant continuing a Slack conversation.",
    language: "Keep the previous context and reply in English.",
    history_title: "[Conversation Context]",
    user: "User",
    assistant: "Assistant",
    requirements_title: "Requirements:",
    requirement_language: "1) Write the response in English.",
    requirement_concise: "2) Keep it concise and focused.",
    failure_banner: "An error occurred while processing your request.",
    timeout: "The response timed out. Please try again shortly.",
    launch_failed: "Failed to launch Codex: ",
    exit_failed: "Codex error: ",
    empty: "The response was empty. Please try again.",
};

static JAPANESE: Template = Template {
    intro: "あなたはSlackの会話を引き継ぐCodexアシスタントです。",
    language: "これまでの文脈を維持し、日本語で回答してください。",
    history_title: "[会話履歴]",
    user: "ユーザー",
    assistant: "アシスタント",
    requirements_title: "要件:",
    requirement_language: "1) 日本語で回答してください。",
    requirement_concise: "2) 重要な点を簡潔に回答してください。",
    failure_banner: "処理中にエラーが発生しました。",
    timeout: "応答の生成がタイムアウトしました。しばらくしてから再度お試しください。",
    launch_failed: "Codex の起動に失敗しました: ",
    exit_failed: "Codex 実行エラー: ",
    empty: "応答が空でした。もう一度お試しください。",
};

static CHINESE: Template = Template {
    intro: "你是一个在 Slack 中接续对话的 Codex 助手。",
    language: "请保留之前的上下文，并用中文回复。",
    history_title: "[对话上下文]",
    user: "用户",
    assistant: "助手",
    requirements_title: "要求:",
    requirement_language: "1) 用中文回答。",
    requirement_concise: "2) 简洁地回答核心内容。",
    failure_banner: "处理请求时发生错误。",
    timeout: "生成回复超时，请稍后再试。",
    launch_failed: "Codex 启动失败: ",
    exit_failed: "Codex 执行错误: ",
    empty: "回复为空，请重试。",
};

/// Render the prompt for `user_text`, keeping only the last `max_messages`
/// history rows.
pub fn build_prompt(history: &[HistoryEntry], user_text: &str, max_messages: usize) -> String {
    let lang = Language::detect(user_text);
    let t = lang.template();
    let recent = &history[history.len().saturating_sub(max_messages)..];

    let mut lines: Vec<String> = Vec::with_capacity(recent.len() + 9);
    lines.push(t.intro.to_string());
    lines.push(t.language.to_string());
    lines.push(String::new());
    lines.push(t.history_title.to_string());
    for row in recent {
        lines.push(format!("{}: {}", lang.role_label(row.role), row.text));
    }
    lines.push(format!("{}: {}", t.user, user_text));
    lines.push(String::new());
    lines.push(t.requirements_title.to_string());
    lines.push(t.requirement_language.to_string());
    lines.push(t.requirement_concise.to_string());
    lines.join("\n")
}
