//! Gutenberg block markup for a finished article.
//!
//! Layout: Introduction heading and paragraphs, separator, one group per
//! listicle item (numbered heading, full-size image, description), FAQ
//! heading and groups, separator, Conclusion heading and paragraphs.
use crate::draft::{ArticleDraft, FaqItem, ListicleItem};
use crate::util::{escape_html, format_paragraphs};

/// A media library entry returned by the WordPress upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct UploadedMedia {
    pub id: u64,
    pub source_url: String,
}

const SEPARATOR: &str =
    "<!-- wp:separator -->\n<hr class=\"wp-block-separator\" />\n<!-- /wp:separator -->";

/// One `wp:paragraph` block per paragraph, separated by blank lines.
pub fn paragraph_blocks<'a, I>(paragraphs: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    paragraphs
        .into_iter()
        .map(|p| {
            format!(
                "<!-- wp:paragraph -->\n<p>{}</p>\n<!-- /wp:paragraph -->",
                escape_html(p)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Numbered groups pairing each listicle item with its uploaded image.
///
/// `media[i]` must be the upload for `items[i]`; extra media are ignored.
pub fn listicle_blocks(items: &[ListicleItem], media: &[UploadedMedia]) -> String {
    items
        .iter()
        .zip(media)
        .enumerate()
        .map(|(index, (item, media))| {
            let title = escape_html(&item.title);
            format!(
                "<!-- wp:group -->\n\
<div class=\"wp-block-group\">\n\
<!-- wp:heading {{\"level\":2}} -->\n\
<h2>{number}. {title}</h2>\n\
<!-- /wp:heading -->\n\
\n\
<!-- wp:image {{\"id\":{id},\"sizeSlug\":\"full\",\"linkDestination\":\"none\"}} -->\n\
<figure class=\"wp-block-image size-full\"><img src=\"{src}\" alt=\"{title}\" /></figure>\n\
<!-- /wp:image -->\n\
\n\
{paragraphs}\n\
</div>\n\
<!-- /wp:group -->",
                number = index + 1,
                title = title,
                id = media.id,
                src = escape_html(&media.source_url),
                paragraphs = paragraph_blocks(format_paragraphs(&item.description)),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One group per question with an h3 heading and the answer paragraphs.
pub fn faq_blocks(faq: &[FaqItem]) -> String {
    faq.iter()
        .map(|item| {
            format!(
                "<!-- wp:group -->\n\
<div class=\"wp-block-group\">\n\
<!-- wp:heading {{\"level\":3}} -->\n\
<h3>{question}</h3>\n\
<!-- /wp:heading -->\n\
{paragraphs}\n\
</div>\n\
<!-- /wp:group -->",
                question = escape_html(&item.question),
                paragraphs = paragraph_blocks(format_paragraphs(&item.answer)),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Full post body for `article` with `media` in listicle order.
pub fn article_content(article: &ArticleDraft, media: &[UploadedMedia]) -> String {
    let intro = paragraph_blocks(format_paragraphs(&article.introduction));
    let listicle = listicle_blocks(&article.listicle, media);
    let faq = faq_blocks(&article.faq);
    let conclusion = paragraph_blocks(format_paragraphs(&article.conclusion));

    format!(
        "<!-- wp:heading -->\n\
<h2>Introduction</h2>\n\
<!-- /wp:heading -->\n\
{intro}\n\
\n\
{SEPARATOR}\n\
\n\
{listicle}\n\
\n\
<!-- wp:heading {{\"level\":2}} -->\n\
<h2>Frequently Asked Questions</h2>\n\
<!-- /wp:heading -->\n\
{faq}\n\
\n\
{SEPARATOR}\n\
\n\
<!-- wp:heading {{\"level\":2}} -->\n\
<h2>Conclusion</h2>\n\
<!-- /wp:heading -->\n\
{conclusion}"
    )
}
