// Prompt Builder
// Assembles the rewrite instruction sent to the remote rewrite service.
//
// Layers, in order: language base template, approach escalation, style
// register, score-gap guidance (only when a previous score is below target),
// then the text itself as the final segment. Pure: no I/O, no randomness.

use crate::models::{Approach, HumanizationOptions};
use crate::services::text_processor::{detect_language, DetectedLanguage};

/// Previous scores below this get the "far from target" guidance tier.
pub const FAR_BELOW_TARGET: i32 = 80;

struct Phrasebook {
    base: &'static str,
    aggressive: &'static str,
    ultra: &'static str,
    academic: &'static str,
    casual: &'static str,
    professional: &'static str,
    creative: &'static str,
    general: &'static str,
    far_below: &'static str,
    close_to: &'static str,
    progress: &'static str,
    text_label: &'static str,
}

const ENGLISH: Phrasebook = Phrasebook {
    base: "Rewrite the text below so it reads as if a person wrote it. Keep the meaning, facts and overall length. \
Vary sentence length and rhythm, prefer plain words over formal ones, use contractions where natural, \
and avoid stock transitions such as \"furthermore\" or \"in conclusion\". \
Return only the rewritten text, with no preamble, notes or quotation marks.",
    aggressive: "Make bold changes: restructure sentences, reorder clauses, merge or split sentences freely, \
and replace predictable word choices. Do not mirror the original sentence structure.",
    ultra: "Rewrite from the ground up. You may change how details are presented, their order and emphasis, \
as long as the core meaning survives. Break every uniform pattern: mix very short sentences with long ones, \
add the occasional aside, and let the voice feel personal.",
    academic: "Register: academic. Keep precise terminology and a measured tone, but avoid formulaic hedging. \
Let the argument flow the way a careful researcher writes, with the occasional first-person observation.",
    casual: "Register: casual. Write like someone talking to a friend: relaxed phrasing, everyday words, \
short sentences, and a bit of personality.",
    professional: "Register: professional. Clear and direct, the way an experienced colleague writes an email. \
Confident, no jargon for its own sake, no corporate filler.",
    creative: "Register: creative. Use vivid, concrete language and an individual voice. \
Surprise the reader with word choice and rhythm.",
    general: "Register: neutral and natural, suitable for a general audience.",
    far_below: "The previous version scored {score}/100 for human-likeness against a target of {target}. \
This is iteration {iteration}, so push much harder: add colloquial expressions, a parenthetical aside or two, \
and varied punctuation (dashes, question marks, the odd exclamation).",
    close_to: "The previous version scored {score}/100 for human-likeness against a target of {target}. \
This is iteration {iteration}; it is close, so focus on subtle cues: a mid-thought correction, \
a rhetorical question, simpler wording for technical terms.",
    progress: "Each iteration should feel more human than the last.",
    text_label: "Text to rewrite:",
};

const CHINESE: Phrasebook = Phrasebook {
    base: "请改写下面的文本，使其读起来像是由真人撰写的。保持原意、事实和整体篇幅不变。\
句子长短要有变化，用平实的词语替代书面化表达，避免“此外”“综上所述”之类的套路连接词。\
只返回改写后的文本，不要任何前言、说明或引号。",
    aggressive: "大胆修改：重组句子结构，调整分句顺序，自由合并或拆分句子，替换可预测的用词，不要沿用原文句式。",
    ultra: "彻底重写。可以改变细节的呈现方式、顺序和侧重点，只要核心意思不变。打破一切整齐划一的模式：\
长短句交错，偶尔加入插话，让语气带有个人色彩。",
    academic: "语体：学术。保留准确的术语和克制的语气，但避免公式化的表述，像认真做研究的人那样自然行文。",
    casual: "语体：口语。像跟朋友聊天一样，用轻松的措辞和日常词汇，句子简短，带点个性。",
    professional: "语体：专业。清晰直接，像有经验的同事写邮件，自信、不堆砌术语、不说空话。",
    creative: "语体：创意。使用生动具体的语言和个人化的声音，在用词和节奏上给读者惊喜。",
    general: "语体：自然中性，适合一般读者。",
    far_below: "上一版的人类相似度得分为 {score}/100，目标是 {target}。这是第 {iteration} 轮，请加大力度：\
加入口语化表达、一两处括号补充，以及多样的标点（破折号、问号、偶尔的感叹号）。",
    close_to: "上一版的人类相似度得分为 {score}/100，目标是 {target}。这是第 {iteration} 轮，已经接近目标，\
请关注细微之处：思路中途的自我修正、反问句、把专业术语说得更简单。",
    progress: "每一轮都应比上一轮更像真人所写。",
    text_label: "待改写文本：",
};

fn phrasebook(language: DetectedLanguage) -> &'static Phrasebook {
    match language {
        DetectedLanguage::Chinese => &CHINESE,
        DetectedLanguage::English => &ENGLISH,
    }
}

fn style_block(book: &Phrasebook, style: &str) -> &'static str {
    match style {
        "academic" => book.academic,
        "casual" => book.casual,
        "professional" => book.professional,
        "creative" => book.creative,
        _ => book.general,
    }
}

/// Guidance for closing the gap between the previous score and the target.
fn score_gap_block(book: &Phrasebook, previous_score: i32, target: i32, iteration: u32) -> String {
    let template = if previous_score < FAR_BELOW_TARGET {
        book.far_below
    } else {
        book.close_to
    };
    template
        .replace("{score}", &previous_score.to_string())
        .replace("{target}", &target.to_string())
        .replace("{iteration}", &iteration.to_string())
}

/// Build the full rewrite instruction. The text is appended verbatim as the last segment;
/// length validation is the caller's job.
pub fn build_humanize_prompt(
    text: &str,
    options: &HumanizationOptions,
    previous_score: Option<i32>,
) -> String {
    let book = phrasebook(detect_language(text));
    let mut sections: Vec<String> = vec![book.base.to_string()];

    match options.approach {
        Approach::Standard => {}
        Approach::Aggressive => sections.push(book.aggressive.to_string()),
        Approach::Ultra => {
            sections.push(book.aggressive.to_string());
            sections.push(book.ultra.to_string());
        }
    }

    sections.push(style_block(book, &options.normalized_style()).to_string());

    if let Some(score) = previous_score {
        if score < options.target_score {
            sections.push(score_gap_block(book, score, options.target_score, options.iteration_count));
            sections.push(book.progress.to_string());
        }
    }

    sections.push(format!("{}\n\n{}", book.text_label, text));
    sections.join("\n\n")
}
