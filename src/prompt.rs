//! Prompt assembly
//!
//! Everything here is a pure function of its inputs. Passages keep the order
//! retrieval ranked them in, and each is labeled with its 1-based position.

use crate::analysis::CaseSummary;
use crate::providers::ChatTurn;
use crate::retrieval::KnowledgePassage;
use serde_json::Value;

/// System persona for structured analysis
pub const ANALYZE_PERSONA: &str = "You are an expert, senior-level SEO consultant. \
You explain clearly, avoid fluff, and focus on concrete actions. \
Respond STRICTLY as valid JSON following the schema described in the user message. \
Do not include any extra commentary outside the JSON.";

/// System persona for follow-up chat
pub const CHAT_PERSONA: &str = "You are an experienced SEO consultant. A separate analyzer has already inspected a \
specific URL and produced structured data; you also have access to some SEO \
best-practice reference material.\n\n\
Use ONLY the provided analysis and reference material when answering. \
Explain clearly, avoid fluff, and focus on concrete, practical advice. \
If something is unknown, say so honestly.\n\n\
Format your responses for readability:\n\
- Use short sections with brief headings (e.g. 'Title & meta', 'Content', 'Technical').\n\
- Use numbered lists for step-by-step actions.\n\
- Use bullet points for options or examples.\n\
- Add blank lines between sections so the text is easy to scan.";

const CONTEXT_PREAMBLE: &str =
    "Here is the SEO analysis summary and reference material for the current page:\n\n";

/// Issue categories the model may use
pub const ISSUE_CATEGORIES: &[&str] = &[
    "title",
    "meta_description",
    "content",
    "technical",
    "performance",
    "mobile",
    "structured_data",
    "links",
    "images",
    "social",
    "internationalization",
    "canonical",
    "off_page",
];

const INSTRUCTIONS: &str = "\n[INSTRUCTIONS]\n\
1. Prioritise issues that have the highest likely impact on organic search visibility and clicks.\n\
2. Do not invent metrics (like Core Web Vitals) that are not present in the data.\n\
3. When something is unknown, say it is unknown and base advice on general best practices.\n\
4. Tailor recommendations and EXAMPLES to this specific page (its URL, language, content and issues), \
not generic SEO theory.\n\
5. For each priority issue, provide at least two concrete, context-aware recommended_actions, such as \
sample titles, meta descriptions, heading text, or structured data snippets that would make sense for \
this site.\n\
6. Suggest an overall SEO score (0-100) and grade name based on impact and severity of issues.\n\
7. Respond STRICTLY in the JSON schema described below, without additional commentary.\n\n";

/// Build the single user prompt for structured analysis
pub fn build_analysis_prompt(
    document: &Value,
    summary: &CaseSummary,
    passages: &[KnowledgePassage],
) -> String {
    let mut blocks: Vec<String> = vec![
        "You are an experienced SEO consultant.".to_string(),
        "You receive structured analysis data about a single URL, plus optional reference material \
         from SEO best-practices documents. Use ONLY this information to give practical, honest advice."
            .to_string(),
        "\n[CASE SUMMARY]".to_string(),
        summary.to_string(),
        "\n[ANALYZER_JSON]".to_string(),
        document.to_string(),
    ];

    if !passages.is_empty() {
        blocks.push("\n[REFERENCE_SEO_MATERIAL]".to_string());
        for (idx, passage) in passages.iter().enumerate() {
            blocks.push(format!("--- SOURCE {} ---", idx + 1));
            blocks.push(passage.text.clone());
        }
    }

    blocks.push(format!("{}{}", INSTRUCTIONS, schema_block()));
    blocks.join("\n")
}

fn schema_block() -> String {
    format!(
        "JSON schema:\n\
         {{\n\
         \x20 \"summary\": \"Short paragraph (2-4 sentences) explaining the overall SEO situation for this URL.\",\n\
         \x20 \"priority_issues\": [\n\
         \x20   {{\n\
         \x20     \"category\": \"{}\",\n\
         \x20     \"title\": \"Short title for this issue (max 80 chars)\",\n\
         \x20     \"impact\": \"high | medium | low\",\n\
         \x20     \"difficulty\": \"easy | moderate | hard\",\n\
         \x20     \"recommended_actions\": [\"Concrete, context-aware step 1 with example tailored to this URL\", \"Step 2\", \"...\"]\n\
         \x20   }}\n\
         \x20 ],\n\
         \x20 \"quick_wins\": [\"Concrete actions that can realistically be done within a day.\"],\n\
         \x20 \"long_term_ideas\": [\"Bigger projects or strategic ideas that require more effort.\"],\n\
         \x20 \"score\": 0,  // integer 0-100, where higher is better; you may reuse the heuristic score when reasonable\n\
         \x20 \"grade\": \"Excellent | Good | Needs improvement | Critical\"  // or a close variant\n\
         }}\n",
        ISSUE_CATEGORIES.join(" | ")
    )
}

/// Grounding context injected ahead of the chat history
pub fn build_chat_context(summary: &CaseSummary, passages: &[KnowledgePassage]) -> String {
    let mut blocks = vec![format!("[ANALYZER SUMMARY]\n{}", summary)];
    if !passages.is_empty() {
        blocks.push("\n[REFERENCE SEO MATERIAL]".to_string());
        for (idx, passage) in passages.iter().enumerate() {
            blocks.push(format!("--- SOURCE {} ---\n{}", idx + 1, passage.text));
        }
    }
    blocks.join("\n")
}

/// Retrieval query for chat: the case summary plus the latest user question
pub fn chat_retrieval_query(summary: &CaseSummary, turns: &[ChatTurn]) -> String {
    let mut query = summary.to_string();
    let last_user = turns
        .iter()
        .rev()
        .find(|turn| turn.role == crate::providers::Role::User)
        .map(|turn| turn.content.trim())
        .unwrap_or_default();

    if !last_user.is_empty() {
        query.push_str("\n\nUser question:\n");
        query.push_str(last_user);
    }
    query
}

/// System persona, then the grounding context as an assistant turn, then the caller's turns
pub fn build_conversation(context: &str, turns: &[ChatTurn]) -> Vec<ChatTurn> {
    let mut conversation = Vec::with_capacity(turns.len() + 2);
    conversation.push(ChatTurn::system(CHAT_PERSONA));
    conversation.push(ChatTurn::assistant(format!("{}{}", CONTEXT_PREAMBLE, context)));
    conversation.extend_from_slice(turns);
    conversation
}
