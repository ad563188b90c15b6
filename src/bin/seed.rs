use chrono::{Duration, Utc};
use jewel_commerce::{
    db::{create_orm_conn, run_migrations},
    entity::{
        coupons::{self, ActiveModel as CouponActive, DiscountType},
        products::{self, ActiveModel as ProductActive},
    },
    middleware::auth::{ADMIN_ROLE, issue_token},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;

    let orm = create_orm_conn(&database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    seed_products(&orm).await?;
    seed_coupons(&orm).await?;

    // Handy for trying the admin endpoints locally.
    if std::env::var("JWT_SECRET").is_ok() {
        let admin_id = Uuid::new_v4();
        let token = issue_token(admin_id, ADMIN_ROLE, Duration::hours(24))
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        println!("Admin token (24h): Bearer {token}");
    }

    println!("Seed completed");
    Ok(())
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    // (sku, name, description, price in paise, stock)
    let catalogue = [
        ("RNG-SOL-001", "Solitaire Diamond Ring", "18K gold band with a 0.3ct solitaire", 4_500_000, 12),
        ("RNG-BND-002", "Classic Gold Band Ring", "22K plain gold band", 1_850_000, 30),
        ("EAR-JHM-001", "Kundan Jhumka Earrings", "Handcrafted kundan jhumkas", 750_000, 25),
        ("EAR-STD-002", "Pearl Stud Earrings", "Freshwater pearls on silver posts", 120_000, 60),
        ("NCK-TMP-001", "Temple Necklace", "Gold-plated temple work necklace", 2_400_000, 8),
        ("PND-EVL-001", "Evil Eye Pendant", "Enamel evil eye on 925 silver", 95_000, 40),
        ("CHN-ROP-001", "Rope Chain 20in", "925 silver rope chain", 180_000, 35),
        ("BRC-TNS-001", "Tennis Bracelet", "Cubic zirconia tennis bracelet", 320_000, 15),
        ("BNG-ANT-001", "Antique Bangle Pair", "Oxidised silver bangles", 260_000, 20),
        ("ANK-GHG-001", "Ghungroo Anklet", "Silver anklet with ghungroo bells", 150_000, 45),
    ];

    for (sku, name, description, price, stock) in catalogue {
        let exists = products::Entity::find()
            .filter(products::Column::Sku.eq(sku))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }

        ProductActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            sku: Set(sku.to_string()),
            description: Set(Some(description.to_string())),
            image: Set(None),
            price: Set(price),
            stock: Set(stock),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_coupons(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let exists = coupons::Entity::find()
        .filter(coupons::Column::Code.eq("SAVE10"))
        .one(orm)
        .await?
        .is_some();
    if !exists {
        CouponActive {
            id: Set(Uuid::new_v4()),
            code: Set("SAVE10".to_string()),
            discount_type: Set(DiscountType::Percentage),
            discount_value: Set(1_000),
            max_discount: Set(Some(5_000)),
            min_order_amount: Set(None),
            usage_limit: Set(None),
            used_count: Set(0),
            is_active: Set(true),
            valid_from: Set(None),
            valid_until: Set(None),
            created_at: Set(Utc::now().into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded coupons");
    Ok(())
}
