use std::env;

use anyhow::{Result, ensure};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

#[tokio::main]
async fn main() -> Result<()> {
    let base = env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:1111".to_string());
    let client = Client::new();

    let recipes = json!([
        {
            "id": "carbonara",
            "title": "Chicken Pasta Carbonara",
            "ingredients": ["chicken", "pasta", "eggs", "cheese", "bacon"],
            "cuisine": "Italian",
            "likes": 120
        },
        {
            "id": "cake",
            "title": "Chocolate Cake",
            "ingredients": ["flour", "sugar", "cocoa", "eggs"],
            "likes": 45
        }
    ]);

    let status = client
        .put(format!("{base}/recipes"))
        .json(&recipes)
        .send()
        .await?
        .status();
    ensure!(status == StatusCode::NO_CONTENT, "seeding recipes returned {status}");
    println!("Seeded recipes");

    let draft = json!({
        "id": "carbonara-draft",
        "title": "Pasta Carbonara",
        "ingredients": ["pasta", "eggs", "cheese", "bacon"]
    });
    let similarity: Value = client
        .post(format!("{base}/similarity"))
        .json(&json!({ "recipe": draft }))
        .send()
        .await?
        .json()
        .await?;
    println!("Similarity: {similarity:#}");
    ensure!(
        similarity["has_similar_recipes"] == true,
        "draft carbonara was not flagged as similar"
    );

    for i in 0..6 {
        let status = client
            .post(format!("{base}/interactions"))
            .json(&json!({
                "user_id": "tester",
                "recipe_id": "carbonara",
                "interaction_type": "like",
                "value": 1.0,
                "features": { "relevance": 0.8, "cuisine_type": 1.0, "popularity": 0.1 * i as f64 }
            }))
            .send()
            .await?
            .status();
        ensure!(status == StatusCode::ACCEPTED, "interaction returned {status}");
    }
    println!("Recorded interactions");

    let recommendations: Value = client
        .post(format!("{base}/recommendations"))
        .json(&json!({
            "user_id": "tester",
            "candidates": recipes,
            "preferred_cuisines": ["italian"]
        }))
        .send()
        .await?
        .json()
        .await?;
    println!("Recommendations: {recommendations:#}");

    let weights: Value = client
        .get(format!("{base}/users/tester/weights"))
        .send()
        .await?
        .json()
        .await?;
    println!("Weights: {weights:#}");

    Ok(())
}
