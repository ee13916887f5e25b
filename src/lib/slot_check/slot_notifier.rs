use std::{fmt::Display, time::Duration};

use chrono::Utc;
use lettre::{
    transport::smtp::authentication::{Credentials, Mechanism},
    SmtpTransport, Transport,
};
use log::{info, warn};
use reqwest::{
    header::{ACCEPT, AUTHORIZATION, USER_AGENT},
    Client, RequestBuilder, StatusCode,
};
use serde::Deserialize;
use serde_json::json;

use super::{
    errors::NotifyError,
    helpers::{generate_email, generate_issue_body, generate_issue_title},
    models::{slot_model::SlotSet, Category, Config, EmailConfig},
};

pub const ALERT_LABEL: &str = "appointment-alert";

/// A trait, necessary for every entity that will deliver alerts about new slots.
/// On success returns a reference to what was delivered (an issue URL, a list of recipients).
#[allow(async_fn_in_trait)]
pub trait SlotNotifier {
    async fn notify(&self, category: Category, slots: &SlotSet) -> Result<String, NotifyError>;
}

#[derive(Deserialize)]
struct CreatedIssue {
    html_url: String,
}

/// Opens an issue in a GitHub repository for every batch of new slots.
#[derive(Debug, Clone)]
pub struct GithubNotifier {
    pub client: Client,
    pub api_base: String,
    pub repository: String,
    pub token: String,
    pub booking_url: String,
}

impl GithubNotifier {
    /// Builds a notifier whose every API request gives up after `timeout`.
    pub fn new(
        api_base: &str,
        repository: &str,
        token: &str,
        booking_url: &str,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        Ok(GithubNotifier {
            client: Client::builder().timeout(timeout).build()?,
            api_base: api_base.trim_end_matches('/').to_owned(),
            repository: repository.to_owned(),
            token: token.to_owned(),
            booking_url: booking_url.to_owned(),
        })
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, concat!("dental-slot-notify/", env!("CARGO_PKG_VERSION")))
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Creates the alert label when the repository does not have it yet.
    pub async fn ensure_label_exists(&self) -> Result<(), NotifyError> {
        let url = format!("{}/repos/{}/labels", self.api_base, self.repository);
        let response = self
            .request(self.client.get(format!("{}/{}", url, ALERT_LABEL)))
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                info!("Creating label {} in {}", ALERT_LABEL, self.repository);
                let response = self
                    .request(self.client.post(url))
                    .json(&json!({
                        "name": ALERT_LABEL,
                        "color": "d73a4a",
                        "description": "New dental appointment availability",
                    }))
                    .send()
                    .await?;
                match response.status() {
                    StatusCode::CREATED => Ok(()),
                    status => Err(NotifyError::Api {
                        status: status.as_u16(),
                        body: response.text().await.unwrap_or_default(),
                    }),
                }
            }
            status => Err(NotifyError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

impl SlotNotifier for GithubNotifier {
    async fn notify(&self, category: Category, slots: &SlotSet) -> Result<String, NotifyError> {
        if let Err(err) = self.ensure_label_exists().await {
            warn!("Could not ensure label {} exists: {}", ALERT_LABEL, err);
        }

        let url = format!("{}/repos/{}/issues", self.api_base, self.repository);
        let response = self
            .request(self.client.post(url))
            .json(&json!({
                "title": generate_issue_title(category, slots),
                "body": generate_issue_body(category, slots, &self.booking_url, Utc::now()),
                "labels": [ALERT_LABEL],
            }))
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(NotifyError::Api {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let issue: CreatedIssue = response.json().await?;
        info!("Created issue {}", issue.html_url);
        Ok(issue.html_url)
    }
}

/// Sends one plain-text letter about new slots to every configured recipient.
pub struct EmailNotifier<T: Transport> {
    pub transport: T,
    pub config: EmailConfig,
    pub booking_url: String,
}

impl<T> SlotNotifier for EmailNotifier<T>
where
    T: Transport,
    T::Error: Display,
{
    async fn notify(&self, category: Category, slots: &SlotSet) -> Result<String, NotifyError> {
        let email = generate_email(&self.config, category, slots, &self.booking_url, Utc::now())?;
        self.transport
            .send(&email)
            .map_err(|err| NotifyError::Email(err.to_string()))?;
        let recipients = self.config.recipients.join(", ");
        info!("Sent email to {}", recipients);
        Ok(format!("email to {}", recipients))
    }
}

/// Notifier picked from config: GitHub when a repository and token are set,
/// otherwise email when SMTP is set, otherwise none.
pub enum Notifier {
    Github(GithubNotifier),
    Email(EmailNotifier<SmtpTransport>),
    Disabled,
}

impl Notifier {
    pub fn from_config(config: &Config) -> Result<Notifier, NotifyError> {
        if let (Some(repository), Some(token)) = (&config.github_repository, &config.github_token)
        {
            return Ok(Notifier::Github(GithubNotifier::new(
                &config.github_api_base,
                repository,
                token,
                &config.booking_url,
                Duration::from_secs(config.request_timeout_secs),
            )?));
        }
        if let Some(email) = &config.email {
            let transport = SmtpTransport::relay(&email.relay)
                .map_err(|err| NotifyError::Email(err.to_string()))?
                .credentials(Credentials::new(
                    email.sender_username.to_owned(),
                    email.sender_password.to_owned(),
                ))
                .authentication(vec![Mechanism::Plain])
                .build();
            return Ok(Notifier::Email(EmailNotifier {
                transport,
                config: email.clone(),
                booking_url: config.booking_url.to_owned(),
            }));
        }
        warn!("Neither GitHub nor email is configured - notifications disabled");
        Ok(Notifier::Disabled)
    }
}

impl SlotNotifier for Notifier {
    async fn notify(&self, category: Category, slots: &SlotSet) -> Result<String, NotifyError> {
        match self {
            Notifier::Github(notifier) => notifier.notify(category, slots).await,
            Notifier::Email(notifier) => notifier.notify(category, slots).await,
            Notifier::Disabled => Err(NotifyError::NotConfigured),
        }
    }
}
