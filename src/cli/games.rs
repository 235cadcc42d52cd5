use anyhow::Result;

use crate::classify::Classifier;
use crate::config::MonitorConfig;
use crate::database_ops::models::GameFilter;
use crate::database_ops::SitemapStore;

#[derive(Debug, Clone, Default)]
pub struct GamesConfig {
    pub database_url: Option<String>,
    pub filter: GameFilter,
    pub json: bool,
}

pub async fn run(cfg: GamesConfig) -> Result<()> {
    let store = super::connect_store(cfg.database_url.clone(), &MonitorConfig::from_env()?).await?;
    let games = store.list_games(&cfg.filter).await?;
    if cfg.json {
        return super::print_json(&games);
    }
    if games.is_empty() {
        println!("no games match");
    }
    for g in &games {
        let domains: Vec<&str> = g.sources.iter().map(|s| s.domain.as_str()).collect();
        println!(
            "{:>4.1}  {:<40} platforms={} [{}]",
            g.game.score,
            g.game.name,
            g.game.platform_count,
            domains.join(", ")
        );
    }
    Ok(())
}

pub async fn run_stats(database_url: Option<String>, json: bool) -> Result<()> {
    let store = super::connect_store(database_url, &MonitorConfig::from_env()?).await?;
    let stats = store.stats().await?;
    if json {
        return super::print_json(&stats);
    }
    println!("games:           {}", stats.total_games);
    println!("platforms:       {}", stats.total_platforms);
    println!("cross-platform:  {}", stats.cross_platform_games);
    println!("score >= 2.0:    {}", stats.high_score_games);
    Ok(())
}

/// Offline classification; one line per URL.
pub fn run_classify(urls: &[String], json: bool) -> Result<()> {
    let classifier = Classifier::default();
    if json {
        let rows: Vec<_> = urls
            .iter()
            .map(|u| serde_json::json!({ "url": u, "result": classifier.classify(u) }))
            .collect();
        return super::print_json(&rows);
    }
    for url in urls {
        println!("{}", classify_line(&classifier, url));
    }
    Ok(())
}

fn classify_line(classifier: &Classifier, url: &str) -> String {
    match classifier.classify(url) {
        Some(c) => format!("{url}\t{}\t{}", c.name, c.clean_name),
        None => format!("{url}\tskip"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_lines_show_skip_or_names() {
        let c = Classifier::default();
        assert_eq!(
            classify_line(&c, "https://poki.com/en/g/subway-surfers"),
            "https://poki.com/en/g/subway-surfers\tsubway-surfers\tsubway-surfers"
        );
        assert_eq!(
            classify_line(&c, "https://example.com/category/action/"),
            "https://example.com/category/action/\tskip"
        );
    }
}
