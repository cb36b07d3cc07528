use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Source of light-hearted replies. Never fails; falls back to canned text.
#[async_trait]
pub trait TriviaSource: Send + Sync {
    async fn joke(&self) -> String;

    async fn fact(&self) -> String;
}

pub const FALLBACK_JOKE: &str = "Couldn't fetch a joke right now, but here's a classic: \
    Why don't skeletons fight each other? They don't have the guts.";

pub const FALLBACK_FACT: &str =
    "Couldn't retrieve a fact right now. Did you know? Octopuses have three hearts!";

#[derive(Deserialize)]
struct JokeResponse {
    joke: Option<String>,
}

#[derive(Deserialize)]
struct FactResponse {
    text: Option<String>,
}

/// Fetches jokes and facts from public JSON APIs.
pub struct PublicTriviaClient {
    http: Client,
    joke_url: String,
    fact_url: String,
}

impl PublicTriviaClient {
    pub fn new(joke_url: impl Into<String>, fact_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self {
            http,
            joke_url: joke_url.into(),
            fact_url: fact_url.into(),
        })
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, reqwest::Error> {
        self.http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await
    }
}

#[async_trait]
impl TriviaSource for PublicTriviaClient {
    async fn joke(&self) -> String {
        match self.fetch::<JokeResponse>(&self.joke_url).await {
            Ok(JokeResponse { joke: Some(joke) }) => joke,
            Ok(_) => FALLBACK_JOKE.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Joke API request failed");
                FALLBACK_JOKE.to_string()
            }
        }
    }

    async fn fact(&self) -> String {
        match self.fetch::<FactResponse>(&self.fact_url).await {
            Ok(FactResponse { text: Some(fact) }) => fact,
            Ok(_) => FALLBACK_FACT.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Fact API request failed");
                FALLBACK_FACT.to_string()
            }
        }
    }
}
