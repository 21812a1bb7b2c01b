use crate::types::{ArticleRecord, SourceKind};

/// Fixed-schema Jekyll header, aligned like the posts already in the archive.
pub fn build_front_matter(record: &ArticleRecord, source: SourceKind, thumbnail: &str) -> String {
    let tags: Vec<&str> = if record.categories.is_empty() {
        source.default_tags().to_vec()
    } else {
        record.categories.iter().map(String::as_str).collect()
    };
    let tags_yaml = tags
        .iter()
        .map(|tag| format!("    - {tag}"))
        .collect::<Vec<_>>()
        .join("\n");
    let category = tags.first().copied().unwrap_or_default();

    format!(
        "---\n\
         layout:     post\n\
         title:      \"{title}\"\n\
         subtitle:   \n\
         date:       {date}\n\
         author:     {author}\n\
         thumbnail:  {thumbnail}\n\
         catalog: true\n\
         categories: {category}\n\
         original_url: {url}\n\
         tags:\n\
         {tags_yaml}\n\
         ---\n",
        title = escape_title(&record.title),
        date = record.publish_date.format("%Y-%m-%d"),
        author = record.author,
        url = record.canonical_url,
    )
}

pub fn build_post_document(front_matter: &str, body_markdown: &str) -> String {
    format!("{front_matter}\n{body_markdown}")
}

fn escape_title(title: &str) -> String {
    title.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Fragment;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn record(categories: &[&str]) -> ArticleRecord {
        ArticleRecord {
            title: "Docker 入门".to_string(),
            author: "someone".to_string(),
            publish_date: NaiveDate::from_ymd_opt(2019, 11, 21).unwrap(),
            canonical_url: "https://www.cnblogs.com/x/p/1.html".to_string(),
            thumbnail_url: None,
            categories: categories.iter().map(|c| c.to_string()).collect(),
            fragment: Fragment::parse("<p>x</p>"),
        }
    }

    #[test]
    fn header_layout_matches_archive() {
        let header = build_front_matter(
            &record(&["docker", "linux"]),
            SourceKind::AtomFeed,
            "/images/default-post-thumbnail.png",
        );
        assert_eq!(
            header,
            "---\n\
             layout:     post\n\
             title:      \"Docker 入门\"\n\
             subtitle:   \n\
             date:       2019-11-21\n\
             author:     someone\n\
             thumbnail:  /images/default-post-thumbnail.png\n\
             catalog: true\n\
             categories: docker\n\
             original_url: https://www.cnblogs.com/x/p/1.html\n\
             tags:\n    - docker\n    - linux\n\
             ---\n"
        );
    }

    #[test]
    fn empty_categories_use_source_defaults() {
        let social = build_front_matter(&record(&[]), SourceKind::SocialPage, "/t.png");
        assert!(social.contains("categories: 微信公众号\n"));
        assert!(social.contains("tags:\n    - 微信公众号\n---\n"));

        let feed = build_front_matter(&record(&[]), SourceKind::AtomFeed, "/t.png");
        assert!(feed.contains("categories: Cnblogs\n"));
        assert!(feed.contains("tags:\n    - Cnblogs\n---\n"));
    }

    #[test]
    fn quotes_in_title_are_escaped() {
        let mut quoted = record(&["a"]);
        quoted.title = r#"Say "hi" \o/"#.to_string();
        let header = build_front_matter(&quoted, SourceKind::AtomFeed, "/t.png");
        assert!(header.contains(r#"title:      "Say \"hi\" \\o/""#));
    }

    #[test]
    fn document_separates_header_and_body_with_blank_line() {
        assert_eq!(build_post_document("---\n---\n", "body\n"), "---\n---\n\nbody\n");
    }
}
