use crate::{
    error::{ApiError, Result},
    models::{
        BrandRef, NewStrain, Store, StoreListing, StrainListing, TerpeneLevel,
        UserStrainPreference,
    },
};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Storage behind the catalog: the read model the recommendation pipeline consumes
/// plus the handful of writes exposed over HTTP.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Every strain with its brand, terpene levels and store listings.
    async fn fetch_catalog(&self) -> Result<Vec<StrainListing>>;

    /// Ingest a store's menu, creating brands, terpenes and strains as needed.
    async fn create_strains(
        &self,
        store_name: &str,
        strains: &[NewStrain],
    ) -> Result<Vec<StrainListing>>;

    async fn create_store(&self, name: &str) -> Result<Store>;

    async fn upsert_preference(
        &self,
        preference: &UserStrainPreference,
    ) -> Result<UserStrainPreference>;

    async fn preferences_for_user(&self, user_id: &str) -> Result<Vec<UserStrainPreference>>;
}

#[derive(FromRow)]
struct StrainRow {
    id: Uuid,
    name: String,
    url: Option<String>,
    thc: Option<f64>,
    weight: Vec<String>,
    price: Vec<String>,
    strain_type: Option<String>,
    brand_id: Option<Uuid>,
    brand_name: Option<String>,
}

impl From<StrainRow> for StrainListing {
    fn from(row: StrainRow) -> Self {
        let brand = match (row.brand_id, row.brand_name) {
            (id, Some(name)) => Some(BrandRef {
                id: id.map(|id| id.to_string()),
                name,
            }),
            _ => None,
        };

        StrainListing {
            id: Some(row.id.to_string()),
            name: Some(row.name),
            url: row.url,
            thc: row.thc,
            weight: row.weight,
            price: row.price,
            strain_type: row.strain_type,
            brand,
            terpenes: Vec::new(),
            stores: Vec::new(),
        }
    }
}

#[derive(FromRow)]
struct StrainTerpeneRow {
    strain_id: Uuid,
    terpene_id: Uuid,
    name: String,
    description: Option<String>,
    percentage: Option<f64>,
}

#[derive(FromRow)]
struct StrainStoreRow {
    strain_id: Uuid,
    store_id: Uuid,
    name: String,
    offer: Option<String>,
}

#[derive(FromRow)]
struct PreferenceRow {
    user_id: Uuid,
    strain_id: Uuid,
    liked: bool,
    reason: Option<String>,
    effects_felt: Option<String>,
    symptom_relief: Option<String>,
}

impl From<PreferenceRow> for UserStrainPreference {
    fn from(row: PreferenceRow) -> Self {
        UserStrainPreference {
            user_id: row.user_id.to_string(),
            strain_id: row.strain_id.to_string(),
            liked: row.liked,
            reason: row.reason,
            effects_felt: row.effects_felt,
            symptom_relief: row.symptom_relief,
        }
    }
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::InvalidInput(format!("Invalid {} id: {}", what, raw)))
}

/// Postgres-backed catalog.
///
/// Expects the schema to exist already: `brands`, `terpenes` and `stores` unique on
/// `name`, `strains` unique on `name` with `weight`/`price` as `TEXT[]`, and the
/// link tables `strain_terpenes`, `strain_stores` and `user_strains` keyed on their
/// id pairs.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    async fn upsert_named(
        tx: &mut Transaction<'_, Postgres>,
        table: &str,
        name: &str,
    ) -> Result<Uuid> {
        // ON CONFLICT ... DO UPDATE so RETURNING also yields the id of an existing row
        let sql = format!(
            "INSERT INTO {table} (id, name) VALUES ($1, $2) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id"
        );
        let id: Uuid = sqlx::query_scalar(&sql)
            .bind(Uuid::new_v4())
            .bind(name)
            .fetch_one(&mut **tx)
            .await?;
        Ok(id)
    }

    async fn insert_strain(
        tx: &mut Transaction<'_, Postgres>,
        strain: &NewStrain,
        brand_id: Uuid,
    ) -> Result<(Uuid, StrainListing)> {
        let row: StrainRow = sqlx::query_as(
            "INSERT INTO strains (id, name, url, thc, weight, price, strain_type, brand_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id, name, url, thc, weight, price, strain_type, brand_id, \
                       (SELECT b.name FROM brands b WHERE b.id = strains.brand_id) AS brand_name",
        )
        .bind(Uuid::new_v4())
        .bind(strain.name.trim())
        .bind(&strain.url)
        .bind(strain.thc)
        .bind(strain.weight_list())
        .bind(strain.price_list())
        .bind(&strain.strain_type)
        .bind(brand_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok((row.id, row.into()))
    }
}

#[async_trait]
impl CatalogRepository for PgCatalog {
    async fn fetch_catalog(&self) -> Result<Vec<StrainListing>> {
        debug!("Fetching strains from database...");

        let strains: Vec<StrainRow> = sqlx::query_as(
            "SELECT s.id, s.name, s.url, s.thc, s.weight, s.price, s.strain_type, \
                    b.id AS brand_id, b.name AS brand_name \
             FROM strains s LEFT JOIN brands b ON b.id = s.brand_id \
             ORDER BY s.name, s.id",
        )
        .fetch_all(&self.pool)
        .await?;

        let terpenes: Vec<StrainTerpeneRow> = sqlx::query_as(
            "SELECT st.strain_id, t.id AS terpene_id, t.name, t.description, st.percentage \
             FROM strain_terpenes st JOIN terpenes t ON t.id = st.terpene_id \
             ORDER BY st.strain_id, t.name",
        )
        .fetch_all(&self.pool)
        .await?;

        let stores: Vec<StrainStoreRow> = sqlx::query_as(
            "SELECT ss.strain_id, st.id AS store_id, st.name, ss.offer \
             FROM strain_stores ss JOIN stores st ON st.id = ss.store_id \
             ORDER BY ss.strain_id, st.name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut terpenes_by_strain: HashMap<Uuid, Vec<TerpeneLevel>> = HashMap::new();
        for row in terpenes {
            terpenes_by_strain
                .entry(row.strain_id)
                .or_default()
                .push(TerpeneLevel {
                    id: Some(row.terpene_id.to_string()),
                    name: row.name,
                    description: row.description,
                    percentage: row.percentage,
                });
        }

        let mut stores_by_strain: HashMap<Uuid, Vec<StoreListing>> = HashMap::new();
        for row in stores {
            stores_by_strain
                .entry(row.strain_id)
                .or_default()
                .push(StoreListing {
                    id: Some(row.store_id.to_string()),
                    name: row.name,
                    offer: row.offer,
                });
        }

        let catalog: Vec<StrainListing> = strains
            .into_iter()
            .map(|row| {
                let id = row.id;
                let mut listing = StrainListing::from(row);
                listing.terpenes = terpenes_by_strain.remove(&id).unwrap_or_default();
                listing.stores = stores_by_strain.remove(&id).unwrap_or_default();
                listing
            })
            .collect();

        info!("Returned {} strains.", catalog.len());
        Ok(catalog)
    }

    async fn create_strains(
        &self,
        store_name: &str,
        strains: &[NewStrain],
    ) -> Result<Vec<StrainListing>> {
        info!("Creating {} strains for store: {}", strains.len(), store_name);

        // validate every brand before touching the database
        for strain in strains {
            strain.brand_name()?;
        }

        let mut tx = self.pool.begin().await?;
        let store_id = Self::upsert_named(&mut tx, "stores", store_name.trim()).await?;
        let mut created = Vec::with_capacity(strains.len());

        for strain in strains {
            debug!("Creating strain: {}", strain.name);
            let brand_name = strain.brand_name()?;
            let brand_id = Self::upsert_named(&mut tx, "brands", brand_name).await?;
            let (strain_id, listing) = Self::insert_strain(&mut tx, strain, brand_id).await?;

            sqlx::query(
                "INSERT INTO strain_stores (strain_id, store_id, offer) VALUES ($1, $2, $3) \
                 ON CONFLICT (strain_id, store_id) DO UPDATE SET offer = EXCLUDED.offer",
            )
            .bind(strain_id)
            .bind(store_id)
            .bind(&strain.offer)
            .execute(&mut *tx)
            .await?;

            for (terpene_name, percentage) in strain.terpene_percentages() {
                debug!("Processing terpene: {}", terpene_name);
                let terpene_id: Uuid = sqlx::query_scalar(
                    "INSERT INTO terpenes (id, name, description) VALUES ($1, $2, '') \
                     ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id",
                )
                .bind(Uuid::new_v4())
                .bind(&terpene_name)
                .fetch_one(&mut *tx)
                .await?;

                sqlx::query(
                    "INSERT INTO strain_terpenes (strain_id, terpene_id, percentage) \
                     VALUES ($1, $2, $3) \
                     ON CONFLICT (strain_id, terpene_id) DO UPDATE SET percentage = EXCLUDED.percentage",
                )
                .bind(strain_id)
                .bind(terpene_id)
                .bind(percentage)
                .execute(&mut *tx)
                .await?;
            }

            created.push(listing);
        }

        tx.commit().await?;
        info!("Created {} strains.", created.len());
        Ok(created)
    }

    async fn create_store(&self, name: &str) -> Result<Store> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidInput("Store name cannot be empty".to_string()));
        }

        let (id, name): (Uuid, String) = sqlx::query_as(
            "INSERT INTO stores (id, name) VALUES ($1, $2) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id, name",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(Store {
            id: id.to_string(),
            name,
        })
    }

    async fn upsert_preference(
        &self,
        preference: &UserStrainPreference,
    ) -> Result<UserStrainPreference> {
        let user_id = parse_id(&preference.user_id, "user")?;
        let strain_id = parse_id(&preference.strain_id, "strain")?;

        let row: PreferenceRow = sqlx::query_as(
            "INSERT INTO user_strains \
                 (user_id, strain_id, liked, reason, effects_felt, symptom_relief) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, strain_id) DO UPDATE SET \
                 liked = EXCLUDED.liked, reason = EXCLUDED.reason, \
                 effects_felt = EXCLUDED.effects_felt, symptom_relief = EXCLUDED.symptom_relief \
             RETURNING user_id, strain_id, liked, reason, effects_felt, symptom_relief",
        )
        .bind(user_id)
        .bind(strain_id)
        .bind(preference.liked)
        .bind(&preference.reason)
        .bind(&preference.effects_felt)
        .bind(&preference.symptom_relief)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let unknown_reference =
                matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation());
            if unknown_reference {
                ApiError::NotFound("Unknown user or strain".to_string())
            } else {
                ApiError::from(e)
            }
        })?;

        Ok(row.into())
    }

    async fn preferences_for_user(&self, user_id: &str) -> Result<Vec<UserStrainPreference>> {
        let user_id = parse_id(user_id, "user")?;

        let rows: Vec<PreferenceRow> = sqlx::query_as(
            "SELECT user_id, strain_id, liked, reason, effects_felt, symptom_relief \
             FROM user_strains WHERE user_id = $1 ORDER BY strain_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserStrainPreference::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strain_row_converts_to_listing() {
        let id = Uuid::new_v4();
        let brand_id = Uuid::new_v4();
        let listing = StrainListing::from(StrainRow {
            id,
            name: "Blue Dream".into(),
            url: None,
            thc: Some(19.0),
            weight: vec!["3.5g".into()],
            price: vec!["$35".into()],
            strain_type: Some("hybrid".into()),
            brand_id: Some(brand_id),
            brand_name: Some("Cookies".into()),
        });

        assert_eq!(listing.id, Some(id.to_string()));
        assert_eq!(
            listing.brand,
            Some(BrandRef {
                id: Some(brand_id.to_string()),
                name: "Cookies".into()
            })
        );
        assert!(listing.terpenes.is_empty());
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        assert!(matches!(
            parse_id("not-a-uuid", "user"),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(parse_id(&Uuid::new_v4().to_string(), "user").is_ok());
    }
}
