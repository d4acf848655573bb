use crate::error::Error;
use crate::gmail_api::client::GmailClient;
use crate::types::{Label, LabelsResponse};

pub async fn fetch_labels(client: &GmailClient) -> Result<Vec<Label>, Error> {
    let labels_data: LabelsResponse = client.get_json(&client.url("labels")).await?;
    Ok(labels_data.labels.unwrap_or_default())
}
