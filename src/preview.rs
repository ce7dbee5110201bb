//! Plain-text rendering of the current draft for the terminal.
//!
//! All model-generated text passes through [`strip_control_chars`] so a
//! hostile completion cannot drive the terminal.
use std::fmt::Write;

use crate::draft::{DraftState, GeneratedImage};
use crate::util::{display_width, format_paragraphs, strip_control_chars, truncate_to_width};

/// Image prompts are shown on one line, cut to this many columns.
const PROMPT_WIDTH: usize = 72;

fn clean(text: &str) -> String {
    strip_control_chars(text).into_owned()
}

fn image_line(image: Option<&GeneratedImage>) -> String {
    match image {
        Some(image) => format!("[image {} ready]", image.ratio),
        None => "[image missing]".to_string(),
    }
}

fn push_paragraphs(out: &mut String, text: &str) {
    for paragraph in format_paragraphs(text) {
        let _ = writeln!(out, "  {}", clean(paragraph));
    }
}

/// Render the draft, or a hint when there is nothing to show.
pub fn render(state: &DraftState) -> String {
    let Some(article) = &state.article else {
        return "No draft yet. Run `listicle generate <TITLE>` to create one.\n".to_string();
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", clean(&state.title));
    let _ = writeln!(out, "{}", "=".repeat(display_width(&state.title).max(3)));
    let _ = writeln!(
        out,
        "Featured {}  {}",
        image_line(state.featured_image.as_ref()),
        truncate_to_width(&clean(&article.featured_image_prompt), PROMPT_WIDTH)
    );
    out.push('\n');

    out.push_str("Introduction\n");
    push_paragraphs(&mut out, &article.introduction);
    out.push('\n');

    for (index, item) in article.listicle.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", index + 1, clean(&item.title));
        let _ = writeln!(
            out,
            "  {} next: {}",
            image_line(state.listicle_images.get(&index)),
            state.ratio_for(index)
        );
        let _ = writeln!(
            out,
            "  prompt: {}",
            truncate_to_width(&clean(&item.image_prompt), PROMPT_WIDTH)
        );
        push_paragraphs(&mut out, &item.description);
        out.push('\n');
    }

    if !article.faq.is_empty() {
        out.push_str("Frequently Asked Questions\n");
        for item in &article.faq {
            let _ = writeln!(out, "  Q: {}", clean(&item.question));
            for paragraph in format_paragraphs(&item.answer) {
                let _ = writeln!(out, "     {}", clean(paragraph));
            }
        }
        out.push('\n');
    }

    out.push_str("Conclusion\n");
    push_paragraphs(&mut out, &article.conclusion);
    out.push('\n');

    let _ = writeln!(out, "Slug:            {}", clean(&article.slug));
    let _ = writeln!(out, "Focus keyphrase: {}", clean(&article.focus_keyphrase));
    let _ = writeln!(out, "Meta:            {}", clean(&article.meta_description));
    let _ = writeln!(
        out,
        "Ready to publish: {}",
        if state.is_publishable() { "yes" } else { "no" }
    );
    out
}
