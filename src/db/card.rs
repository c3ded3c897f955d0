//! Game card catalog storage.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct CardStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardType {
    Ancient,
    Elemental,
    Beast,
    Spirit,
    Hybrid,
}

impl CardType {
    pub const ALL: [CardType; 5] = [
        CardType::Ancient,
        CardType::Elemental,
        CardType::Beast,
        CardType::Spirit,
        CardType::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Ancient => "Ancient",
            CardType::Elemental => "Elemental",
            CardType::Beast => "Beast",
            CardType::Spirit => "Spirit",
            CardType::Hybrid => "Hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardIcon {
    pub ic1: String,
    pub ic2: String,
    pub ic3: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStats {
    pub attack: i64,
    pub defense: i64,
    pub mana: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub origin: String,
    pub dna_rate: i64,
    pub icon: CardIcon,
    pub stats: CardStats,
    pub skills: Vec<Skill>,
    pub lore: String,
    pub image_url: String,
    pub release_date: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A card to insert. Defaults apply to `image_url` and `release_date`.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub id: String,
    pub name: String,
    pub card_type: CardType,
    pub origin: String,
    pub dna_rate: i64,
    pub icon: CardIcon,
    pub stats: CardStats,
    pub skills: Vec<Skill>,
    pub lore: String,
    pub image_url: Option<String>,
    pub release_date: Option<String>,
}

/// Partial card update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct CardUpdate {
    pub name: Option<String>,
    pub card_type: Option<CardType>,
    pub origin: Option<String>,
    pub dna_rate: Option<i64>,
    pub icon: Option<CardIcon>,
    pub stats: Option<CardStats>,
    pub skills: Option<Vec<Skill>>,
    pub lore: Option<String>,
    pub image_url: Option<String>,
    pub release_date: Option<String>,
}

/// Listing filter; every field is optional.
#[derive(Debug, Clone, Default)]
pub struct CardFilter {
    pub card_type: Option<CardType>,
    pub dna_rate: Option<i64>,
    pub min_attack: Option<i64>,
    pub max_attack: Option<i64>,
    /// Case-insensitive substring of name or lore
    pub query: Option<String>,
}

/// One page of cards plus the total matching count.
#[derive(Debug, Clone)]
pub struct CardPage {
    pub cards: Vec<Card>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl CardPage {
    pub fn pages(&self) -> i64 {
        if self.limit <= 0 {
            return 0;
        }
        (self.total + self.limit - 1) / self.limit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub card_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total: i64,
    pub types: i64,
    pub distribution: Vec<TypeCount>,
}

#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error("card id already exists")]
    AlreadyExists,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(sqlx::FromRow)]
struct CardRow {
    id: String,
    name: String,
    card_type: String,
    origin: String,
    dna_rate: i64,
    icon_1: String,
    icon_2: String,
    icon_3: String,
    attack: i64,
    defense: i64,
    mana: i64,
    skills: String,
    lore: String,
    image_url: String,
    release_date: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<CardRow> for Card {
    type Error = sqlx::Error;

    fn try_from(row: CardRow) -> Result<Self, Self::Error> {
        let card_type = CardType::parse(&row.card_type).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown card type: {}", row.card_type).into())
        })?;
        let skills: Vec<Skill> =
            serde_json::from_str(&row.skills).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Self {
            id: row.id,
            name: row.name,
            card_type,
            origin: row.origin,
            dna_rate: row.dna_rate,
            icon: CardIcon {
                ic1: row.icon_1,
                ic2: row.icon_2,
                ic3: row.icon_3,
            },
            stats: CardStats {
                attack: row.attack,
                defense: row.defense,
                mana: row.mana,
            },
            skills,
            lore: row.lore,
            image_url: row.image_url,
            release_date: row.release_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn encode_skills(skills: &[Skill]) -> Result<String, sqlx::Error> {
    serde_json::to_string(skills).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

impl CardStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a card. Fails with `AlreadyExists` when the id is taken.
    pub async fn create(&self, card: &NewCard) -> Result<Card, CardError> {
        let skills = encode_skills(&card.skills)?;

        sqlx::query(
            "INSERT INTO cards (id, name, card_type, origin, dna_rate, icon_1, icon_2, icon_3,
                                attack, defense, mana, skills, lore, image_url, release_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                     COALESCE(?, '/images/default.svg'), COALESCE(?, datetime('now')))",
        )
        .bind(&card.id)
        .bind(&card.name)
        .bind(card.card_type.as_str())
        .bind(&card.origin)
        .bind(card.dna_rate)
        .bind(&card.icon.ic1)
        .bind(&card.icon.ic2)
        .bind(&card.icon.ic3)
        .bind(card.stats.attack)
        .bind(card.stats.defense)
        .bind(card.stats.mana)
        .bind(&skills)
        .bind(&card.lore)
        .bind(card.image_url.as_deref())
        .bind(card.release_date.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => CardError::AlreadyExists,
            _ => CardError::Database(e),
        })?;

        self.get(&card.id)
            .await?
            .ok_or(CardError::Database(sqlx::Error::RowNotFound))
    }

    /// Get a card by id.
    pub async fn get(&self, id: &str) -> Result<Option<Card>, sqlx::Error> {
        let row: Option<CardRow> = sqlx::query_as(
            "SELECT id, name, card_type, origin, dna_rate, icon_1, icon_2, icon_3,
                    attack, defense, mana, skills, lore, image_url, release_date,
                    created_at, updated_at
             FROM cards WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Card::try_from).transpose()
    }

    /// List cards matching `filter`, newest first. `page` is 1-based.
    pub async fn list(
        &self,
        filter: &CardFilter,
        page: i64,
        limit: i64,
    ) -> Result<CardPage, sqlx::Error> {
        let card_type = filter.card_type.map(|t| t.as_str());
        let query = filter.query.as_deref();
        let offset = (page.max(1) - 1).saturating_mul(limit);

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM cards
             WHERE (? IS NULL OR card_type = ?)
               AND (? IS NULL OR dna_rate = ?)
               AND (? IS NULL OR attack >= ?)
               AND (? IS NULL OR attack <= ?)
               AND (? IS NULL OR instr(lower(name), lower(?)) > 0
                              OR instr(lower(lore), lower(?)) > 0)",
        )
        .bind(card_type)
        .bind(card_type)
        .bind(filter.dna_rate)
        .bind(filter.dna_rate)
        .bind(filter.min_attack)
        .bind(filter.min_attack)
        .bind(filter.max_attack)
        .bind(filter.max_attack)
        .bind(query)
        .bind(query)
        .bind(query)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<CardRow> = sqlx::query_as(
            "SELECT id, name, card_type, origin, dna_rate, icon_1, icon_2, icon_3,
                    attack, defense, mana, skills, lore, image_url, release_date,
                    created_at, updated_at
             FROM cards
             WHERE (? IS NULL OR card_type = ?)
               AND (? IS NULL OR dna_rate = ?)
               AND (? IS NULL OR attack >= ?)
               AND (? IS NULL OR attack <= ?)
               AND (? IS NULL OR instr(lower(name), lower(?)) > 0
                              OR instr(lower(lore), lower(?)) > 0)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ? OFFSET ?",
        )
        .bind(card_type)
        .bind(card_type)
        .bind(filter.dna_rate)
        .bind(filter.dna_rate)
        .bind(filter.min_attack)
        .bind(filter.min_attack)
        .bind(filter.max_attack)
        .bind(filter.max_attack)
        .bind(query)
        .bind(query)
        .bind(query)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let cards = rows
            .into_iter()
            .map(Card::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CardPage {
            cards,
            total: total.0,
            page,
            limit,
        })
    }

    /// Apply a partial update. Returns None if the card does not exist.
    pub async fn update(&self, id: &str, update: &CardUpdate) -> Result<Option<Card>, sqlx::Error> {
        let skills = update.skills.as_deref().map(encode_skills).transpose()?;
        let icon = update.icon.as_ref();
        let stats = update.stats.as_ref();

        let result = sqlx::query(
            "UPDATE cards SET
                name = COALESCE(?, name),
                card_type = COALESCE(?, card_type),
                origin = COALESCE(?, origin),
                dna_rate = COALESCE(?, dna_rate),
                icon_1 = COALESCE(?, icon_1),
                icon_2 = COALESCE(?, icon_2),
                icon_3 = COALESCE(?, icon_3),
                attack = COALESCE(?, attack),
                defense = COALESCE(?, defense),
                mana = COALESCE(?, mana),
                skills = COALESCE(?, skills),
                lore = COALESCE(?, lore),
                image_url = COALESCE(?, image_url),
                release_date = COALESCE(?, release_date),
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(update.name.as_deref())
        .bind(update.card_type.map(|t| t.as_str()))
        .bind(update.origin.as_deref())
        .bind(update.dna_rate)
        .bind(icon.map(|i| i.ic1.as_str()))
        .bind(icon.map(|i| i.ic2.as_str()))
        .bind(icon.map(|i| i.ic3.as_str()))
        .bind(stats.map(|s| s.attack))
        .bind(stats.map(|s| s.defense))
        .bind(stats.map(|s| s.mana))
        .bind(skills.as_deref())
        .bind(update.lore.as_deref())
        .bind(update.image_url.as_deref())
        .bind(update.release_date.as_deref())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Delete a card. Returns true if a card was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Total count plus per-type distribution of the cards present.
    pub async fn stats(&self) -> Result<CatalogStats, sqlx::Error> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT card_type, COUNT(*) FROM cards GROUP BY card_type ORDER BY card_type",
        )
        .fetch_all(&self.pool)
        .await?;

        let distribution: Vec<TypeCount> = rows
            .into_iter()
            .map(|(card_type, count)| TypeCount { card_type, count })
            .collect();

        Ok(CatalogStats {
            total: distribution.iter().map(|t| t.count).sum(),
            types: distribution.len() as i64,
            distribution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn new_card(id: &str, name: &str, card_type: CardType, attack: i64) -> NewCard {
        NewCard {
            id: id.to_string(),
            name: name.to_string(),
            card_type,
            origin: "Forged in the first dawn".to_string(),
            dna_rate: 5,
            icon: CardIcon {
                ic1: "free".to_string(),
                ic2: "instinct".to_string(),
                ic3: "loyalty".to_string(),
            },
            stats: CardStats {
                attack,
                defense: 600,
                mana: 300,
            },
            skills: vec![Skill {
                name: "Primordial Light".to_string(),
                description: "Hits every enemy".to_string(),
            }],
            lore: format!("The legend of {}", name),
            image_url: None,
            release_date: None,
        }
    }

    #[test]
    fn test_card_type_parse() {
        assert_eq!(CardType::parse("Beast"), Some(CardType::Beast));
        assert_eq!(CardType::parse("beast"), None);
        assert_eq!(CardType::parse("Dragon"), None);
    }

    #[test]
    fn test_pages() {
        let page = CardPage {
            cards: Vec::new(),
            total: 21,
            page: 1,
            limit: 10,
        };
        assert_eq!(page.pages(), 3);
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::open(":memory:").await.unwrap();

        let card = db
            .cards()
            .create(&new_card("card_001", "Aurelios", CardType::Ancient, 800))
            .await
            .unwrap();
        assert_eq!(card.image_url, "/images/default.svg");
        assert_eq!(card.skills.len(), 1);

        let fetched = db.cards().get("card_001").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Aurelios");
        assert_eq!(fetched.card_type, CardType::Ancient);
        assert_eq!(fetched.stats.attack, 800);
        assert_eq!(fetched.skills[0].name, "Primordial Light");

        assert!(db.cards().get("card_404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id() {
        let db = Database::open(":memory:").await.unwrap();
        let card = new_card("card_001", "Aurelios", CardType::Ancient, 800);

        db.cards().create(&card).await.unwrap();
        assert!(matches!(
            db.cards().create(&card).await,
            Err(CardError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let db = Database::open(":memory:").await.unwrap();
        let cards = db.cards();

        cards
            .create(&new_card("c1", "Aurelios", CardType::Ancient, 800))
            .await
            .unwrap();
        cards
            .create(&new_card("c2", "Fenrir", CardType::Beast, 500))
            .await
            .unwrap();
        cards
            .create(&new_card("c3", "Ignis", CardType::Elemental, 950))
            .await
            .unwrap();

        let all = cards.list(&CardFilter::default(), 1, 10).await.unwrap();
        assert_eq!(all.total, 3);
        // Newest first
        assert_eq!(all.cards[0].id, "c3");

        let beasts = cards
            .list(
                &CardFilter {
                    card_type: Some(CardType::Beast),
                    ..Default::default()
                },
                1,
                10,
            )
            .await
            .unwrap();
        assert_eq!(beasts.total, 1);
        assert_eq!(beasts.cards[0].id, "c2");

        let strong = cards
            .list(
                &CardFilter {
                    min_attack: Some(600),
                    max_attack: Some(900),
                    ..Default::default()
                },
                1,
                10,
            )
            .await
            .unwrap();
        assert_eq!(strong.total, 1);
        assert_eq!(strong.cards[0].id, "c1");

        let search = cards
            .list(
                &CardFilter {
                    query: Some("FENR".to_string()),
                    ..Default::default()
                },
                1,
                10,
            )
            .await
            .unwrap();
        assert_eq!(search.total, 1);

        let page2 = cards.list(&CardFilter::default(), 2, 2).await.unwrap();
        assert_eq!(page2.total, 3);
        assert_eq!(page2.cards.len(), 1);
        assert_eq!(page2.pages(), 2);
        assert_eq!(page2.cards[0].id, "c1");
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let db = Database::open(":memory:").await.unwrap();
        db.cards()
            .create(&new_card("c1", "Aurelios", CardType::Ancient, 800))
            .await
            .unwrap();

        let result = db
            .cards()
            .list(
                &CardFilter {
                    query: Some("%".to_string()),
                    ..Default::default()
                },
                1,
                10,
            )
            .await
            .unwrap();
        assert_eq!(result.total, 0);
    }

    #[tokio::test]
    async fn test_update_partial() {
        let db = Database::open(":memory:").await.unwrap();
        db.cards()
            .create(&new_card("c1", "Aurelios", CardType::Ancient, 800))
            .await
            .unwrap();

        let updated = db
            .cards()
            .update(
                "c1",
                &CardUpdate {
                    name: Some("Aurelios Reborn".to_string()),
                    stats: Some(CardStats {
                        attack: 900,
                        defense: 700,
                        mana: 350,
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "Aurelios Reborn");
        assert_eq!(updated.stats.attack, 900);
        assert_eq!(updated.card_type, CardType::Ancient);
        assert_eq!(updated.skills.len(), 1);

        let missing = db
            .cards()
            .update("nope", &CardUpdate::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete_and_stats() {
        let db = Database::open(":memory:").await.unwrap();
        let cards = db.cards();
        cards
            .create(&new_card("c1", "Aurelios", CardType::Ancient, 800))
            .await
            .unwrap();
        cards
            .create(&new_card("c2", "Fenrir", CardType::Beast, 500))
            .await
            .unwrap();
        cards
            .create(&new_card("c3", "Garm", CardType::Beast, 450))
            .await
            .unwrap();

        let stats = cards.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.types, 2);
        assert_eq!(
            stats.distribution,
            vec![
                TypeCount {
                    card_type: "Ancient".to_string(),
                    count: 1
                },
                TypeCount {
                    card_type: "Beast".to_string(),
                    count: 2
                },
            ]
        );

        assert!(cards.delete("c2").await.unwrap());
        assert!(!cards.delete("c2").await.unwrap());
        assert_eq!(cards.stats().await.unwrap().total, 2);
    }
}
