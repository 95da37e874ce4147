/// Plain-text banner at `/`.
pub async fn index() -> &'static str {
    "Web app to demonstrate ISV high assurance flows"
}
