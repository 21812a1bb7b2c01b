use std::fs;
use std::path::Path;
use std::sync::Arc;

use archiver_engine::{
    article_id, ArchiveConfig, Archiver, CategoryTable, FetchSettings, ReqwestFetcher,
    RetryPolicy, Stage,
};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 28).unwrap()
}

fn archiver(root: &Path, download_images: bool, categories: CategoryTable) -> Archiver {
    let settings = FetchSettings {
        retry: RetryPolicy::immediate(2),
        ..FetchSettings::default()
    };
    let fetcher = Arc::new(ReqwestFetcher::new(settings).expect("client builds"));
    let mut config = ArchiveConfig::new(root).with_fixed_today(today());
    config.download_images = download_images;
    let archiver = Archiver::new(fetcher, config, Arc::new(categories));
    archiver.bootstrap().expect("output directories");
    archiver
}

async fn mount_html(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

async fn mount_image(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8, 2, 3], "image/png"))
        .mount(server)
        .await;
}

fn social_page(server: &str) -> String {
    format!(
        r#"<html><head>
        <meta name="author" content="胖胖">
        <meta property="og:image" content="{server}/cover.jpg">
        </head><body>
        <h1 class="rich_media_title"> Docker 入门 </h1>
        <script>var createTime = '2019-11-21 10:00';</script>
        <span class="article-tag__item">docker</span>
        <div id="js_content">
          <p>intro</p>
          <img data-src="{server}/img/1" src="data:image/gif;base64,R0lG">
          <ol><li><section><span leaf="">1. step one</span></section></li></ol>
          <img data-src="{server}/img/missing">
          <pre><code>a</code><code>b</code></pre>
          <pre>   </pre>
          <img data-src="/img/3">
        </div>
        </body></html>"#
    )
}

#[tokio::test]
async fn social_batch_isolates_failing_articles() {
    engine_logging::initialize_for_tests();
    let server = MockServer::start().await;
    mount_html(&server, "/s/good", social_page(&server.uri())).await;
    mount_html(
        &server,
        "/s/empty",
        r#"<html><body><h1 class="rich_media_title">No body</h1></body></html>"#.to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/s/down"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_image(&server, "/img/1").await;
    mount_image(&server, "/img/3").await;
    mount_image(&server, "/cover.jpg").await;
    Mock::given(method("GET"))
        .and(path("/img/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let root = tempfile::TempDir::new().unwrap();
    let archiver = archiver(root.path(), true, CategoryTable::new());
    let ids = vec![
        format!("{}/s/empty", server.uri()),
        format!("{}/s/good", server.uri()),
        format!("{}/s/down", server.uri()),
    ];
    let report = archiver.archive_social_batch(&ids).await;

    assert_eq!(report.written.len(), 1);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].source, ids[0]);
    assert_eq!(report.failures[0].stage, Stage::Extracting);
    assert_eq!(report.failures[1].source, ids[2]);
    assert_eq!(report.failures[1].stage, Stage::Fetching);

    let id = article_id("Docker 入门", NaiveDate::from_ymd_opt(2019, 11, 21).unwrap());
    assert_eq!(id.as_str(), "9fbc30a7");
    let outcome = &report.written[0];
    assert_eq!(outcome.id, id);
    assert_eq!(outcome.assets.located(), 3);
    assert_eq!(outcome.assets.downloaded, 2);
    assert_eq!(outcome.assets.failed, 1);

    let post_path = root.path().join("_posts").join("2019-11-21-9fbc30a7.md");
    assert_eq!(outcome.path, post_path);
    let post = fs::read_to_string(&post_path).unwrap();
    assert!(post.starts_with("---\nlayout:     post\ntitle:      \"Docker 入门\"\n"));
    assert!(post.contains("author:     胖胖\n"));
    assert!(post.contains("thumbnail:  /images/9fbc30a7/thumbnail.png\n"));
    assert!(post.contains("categories: docker\n"));
    assert!(post.contains(&format!("original_url: {}/s/good\n", server.uri())));
    assert!(post.contains("![](/images/9fbc30a7/1.png)"));
    assert!(post.contains("![](/images/9fbc30a7/2.png)"));
    assert!(post.contains("![](/images/9fbc30a7/3.png)"));
    assert!(post.contains("\n1. step one\n"));
    assert!(post.contains("```\na\nb\n```"));
    assert!(!post.contains("data:image"));
    assert!(!post.contains("/img/missing"));

    let images = root.path().join("images").join("9fbc30a7");
    assert!(images.join("1.png").exists());
    assert!(!images.join("2.png").exists());
    assert!(images.join("3.png").exists());
    assert!(images.join("thumbnail.png").exists());

    let empty_posts = fs::read_dir(root.path().join("_posts")).unwrap().count();
    assert_eq!(empty_posts, 1);
}

const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title>Hello</title>
    <link rel="alternate" href="https://www.cnblogs.com/x/p/1.html"/>
    <published>2024-03-01T10:00:00Z</published>
    <author><name>mswei</name></author>
    <content type="html"><![CDATA[<h2>Intro</h2><p>Some <strong>bold</strong> text.</p><pre class="brush:python;">print("hi")</pre>]]></content>
  </entry>
  <entry>
    <title>Loose notes</title>
    <published>sometime</published>
    <content type="html">&lt;p&gt;plain&lt;/p&gt;</content>
  </entry>
</feed>"#;

fn feed_categories() -> CategoryTable {
    let mut table = CategoryTable::new();
    table.insert("https://www.cnblogs.com/x/p/1.html", "python高级");
    table
}

#[tokio::test]
async fn atom_entries_become_dated_posts() {
    let root = tempfile::TempDir::new().unwrap();
    let feed = root.path().join("blog.xml");
    fs::write(&feed, FEED).unwrap();

    let archiver = archiver(root.path(), false, feed_categories());
    let report = archiver.archive_atom_files(&[feed]).await;
    assert!(report.is_clean(), "{:?}", report.failures);
    assert_eq!(report.written.len(), 2);

    let hello = root.path().join("_posts").join("2024-03-01-2859b116.md");
    assert_eq!(
        fs::read_to_string(hello).unwrap(),
        "---\n\
         layout:     post\n\
         title:      \"Hello\"\n\
         subtitle:   \n\
         date:       2024-03-01\n\
         author:     mswei\n\
         thumbnail:  /images/default-post-thumbnail.png\n\
         catalog: true\n\
         categories: python高级\n\
         original_url: https://www.cnblogs.com/x/p/1.html\n\
         tags:\n    - python高级\n\
         ---\n\
         \n\
         ## Intro\n\
         \n\
         Some **bold** text.\n\
         \n\
         ```python\n\
         print(\"hi\")\n\
         ```\n"
    );

    let loose_id = article_id("Loose notes", today());
    let loose = root
        .path()
        .join("_posts")
        .join(format!("2025-07-28-{loose_id}.md"));
    let loose = fs::read_to_string(loose).unwrap();
    assert!(loose.contains("author:     unknown\n"));
    assert!(loose.contains("categories: Cnblogs\n"));
    assert!(loose.contains("tags:\n    - Cnblogs\n---\n"));
    assert!(loose.ends_with("\nplain\n"));
}

#[tokio::test]
async fn rerunning_a_feed_is_byte_identical() {
    let server = MockServer::start().await;
    mount_image(&server, "/pic.png").await;

    let root = tempfile::TempDir::new().unwrap();
    let feed = root.path().join("blog.xml");
    fs::write(
        &feed,
        format!(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
                <title>With picture</title>
                <link rel="alternate" href="https://www.cnblogs.com/x/p/2.html"/>
                <published>2024-03-01T10:00:00+08:00</published>
                <content type="html">&lt;p&gt;&lt;img src="{}/pic.png"&gt;&lt;/p&gt;</content>
            </entry></feed>"#,
            server.uri()
        ),
    )
    .unwrap();

    let archiver = archiver(root.path(), true, CategoryTable::new());
    let first = archiver.archive_atom_file(&feed).await.unwrap();
    let first_post = fs::read(&first.written[0].path).unwrap();
    let second = archiver.archive_atom_file(&feed).await.unwrap();
    let second_post = fs::read(&second.written[0].path).unwrap();

    assert_eq!(first.written[0].id, second.written[0].id);
    assert_eq!(first.written[0].path, second.written[0].path);
    assert_eq!(first_post, second_post);
    assert_eq!(fs::read_dir(root.path().join("_posts")).unwrap().count(), 1);

    let id = &first.written[0].id;
    assert!(String::from_utf8(first_post)
        .unwrap()
        .contains(&format!("![](/images/{id}/1.png)")));
    assert!(root.path().join("images").join(id.as_str()).join("1.png").exists());
}

#[tokio::test]
async fn malformed_feed_file_does_not_stop_the_others() {
    let root = tempfile::TempDir::new().unwrap();
    let broken = root.path().join("broken.xml");
    fs::write(&broken, "<feed xmlns=\"http://www.w3.org/2005/Atom\"><entry><title>x</feed>").unwrap();
    let good = root.path().join("good.xml");
    fs::write(&good, FEED).unwrap();
    let missing = root.path().join("missing.xml");

    let archiver = archiver(root.path(), false, feed_categories());
    let report = archiver
        .archive_atom_files(&[broken.clone(), missing.clone(), good])
        .await;

    assert_eq!(report.written.len(), 2);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].source, broken.display().to_string());
    assert_eq!(report.failures[0].stage, Stage::Parsing);
    assert_eq!(report.failures[1].source, missing.display().to_string());
}
