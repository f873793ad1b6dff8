use std::future::Future;

use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use crate::domain::order::{Delivery, Item, Order, Payment};

// ============================================================================
// Synthetic Order Generator
// ============================================================================
//
// Produces random orders that pass validation, for load and demo traffic.
// All items share the order's track number, goods_total is the sum of item
// totals and amount = goods_total + delivery_cost.
//
// ============================================================================

const FIRST_NAMES: &[&str] = &["Ivan", "Anna", "Oleg", "Maria", "Pavel", "Elena", "Sergey", "Olga"];
const LAST_NAMES: &[&str] = &["Petrov", "Smirnova", "Ivanov", "Kuznetsova", "Popov", "Sokolova"];
const CITIES: &[(&str, &str)] = &[
    ("Moscow", "Moscow"),
    ("Kazan", "Tatarstan"),
    ("Novosibirsk", "Novosibirsk Oblast"),
    ("Yekaterinburg", "Sverdlovsk Oblast"),
    ("Kiryat Mozkin", "Kraiot"),
];
const STREETS: &[&str] = &["Lenina", "Ploshad Mira", "Sadovaya", "Tverskaya", "Nevsky"];
const PRODUCTS: &[&str] = &["Mascaras", "Sneakers", "Backpack", "Headphones", "Teapot", "Scarf"];
const BRANDS: &[&str] = &["Vivienne Sabo", "Nordwind", "Kettle & Co", "Polar", "Sputnik"];
const SIZES: &[&str] = &["S", "M", "L", "XL", "0"];
const CURRENCIES: &[&str] = &["USD", "EUR", "RUB", "GBP", "KZT"];
const PROVIDERS: &[&str] = &["wbpay", "click", "paypal"];
const BANKS: &[&str] = &["sber", "alpha", "tinkoff", "vtb"];
const LOCALES: &[&str] = &["en", "ru"];
const DELIVERY_SERVICES: &[&str] = &["meest", "dhl", "pony"];

fn pick<R: Rng + ?Sized>(rng: &mut R, values: &[&'static str]) -> &'static str {
    values.choose(rng).copied().unwrap_or_default()
}

/// A fresh random order using the thread-local generator.
pub fn new_order() -> Order {
    random_order(&mut rand::thread_rng())
}

/// Hand one fresh order to `publish` per `interval` until `shutdown` resolves.
/// `shutdown` is polled across iterations, so a signal that fires while an
/// order is being published still stops the loop. Returns the number of
/// orders handed out.
pub async fn publish_until<S, P, Fut>(interval: std::time::Duration, shutdown: S, mut publish: P) -> u64
where
    S: Future<Output = ()>,
    P: FnMut(Order) -> Fut,
    Fut: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(interval.max(std::time::Duration::from_millis(1)));
    let mut published = 0;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                publish(new_order()).await;
                published += 1;
            }
        }
    }

    published
}

pub fn random_order<R: Rng + ?Sized>(rng: &mut R) -> Order {
    let order_uid = Uuid::new_v4().to_string();
    let track_number = format!("WBILM{}", rng.gen_range(1_000_000..=9_999_999));

    let items: Vec<Item> = (0..rng.gen_range(1..=4))
        .map(|_| {
            let price = rng.gen_range(1_000..=25_000);
            let sale = rng.gen_range(5..=50);
            Item {
                chrt_id: rng.gen_range(1_000_000..=9_999_999),
                track_number: track_number.clone(),
                price,
                rid: Uuid::new_v4().simple().to_string(),
                name: pick(rng, PRODUCTS).to_string(),
                sale,
                size: pick(rng, SIZES).to_string(),
                total_price: price * (100 - sale) / 100,
                nm_id: rng.gen_range(1_000_000..=9_999_999),
                brand: pick(rng, BRANDS).to_string(),
                status: 202,
            }
        })
        .collect();
    let goods_total: i64 = items.iter().map(|item| item.total_price).sum();

    let first = pick(rng, FIRST_NAMES);
    let last = pick(rng, LAST_NAMES);
    let (city, region) = CITIES.choose(rng).copied().unwrap_or(("Moscow", "Moscow"));

    let delivery = Delivery {
        name: format!("{} {}", first, last),
        phone: format!("+79{:09}", rng.gen_range(0..1_000_000_000u64)),
        zip: format!("{:06}", rng.gen_range(100_000..1_000_000)),
        city: city.to_string(),
        address: format!("{} {}", pick(rng, STREETS), rng.gen_range(1..=200)),
        region: region.to_string(),
        email: format!(
            "{}.{}{}@example.com",
            first.to_lowercase(),
            last.to_lowercase(),
            rng.gen_range(1..=999)
        ),
    };

    let delivery_cost = rng.gen_range(150..=1_000);
    let payment = Payment {
        transaction: order_uid.clone(),
        request_id: String::new(),
        currency: pick(rng, CURRENCIES).to_string(),
        provider: pick(rng, PROVIDERS).to_string(),
        amount: goods_total + delivery_cost,
        payment_dt: Utc::now().timestamp() - rng.gen_range(100..=1_000),
        bank: pick(rng, BANKS).to_string(),
        delivery_cost,
        goods_total,
        custom_fee: 0,
    };

    Order {
        order_uid,
        track_number,
        entry: "WBIL".to_string(),
        delivery,
        payment,
        items,
        locale: pick(rng, LOCALES).to_string(),
        internal_signature: String::new(),
        customer_id: format!("{}{}", last.to_lowercase(), rng.gen_range(1..=9_999)),
        delivery_service: pick(rng, DELIVERY_SERVICES).to_string(),
        shardkey: rng.gen_range(1..=10).to_string(),
        sm_id: rng.gen_range(1..=100),
        date_created: Utc::now() - Duration::minutes(rng.gen_range(1..=100)),
        oof_shard: "1".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::validate_order;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_orders_are_valid() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let order = random_order(&mut rng);
            assert!(validate_order(&order).is_ok(), "{:?}", validate_order(&order));
        }
    }

    #[test]
    fn test_totals_are_consistent() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let order = random_order(&mut rng);
            let sum: i64 = order.items.iter().map(|i| i.total_price).sum();

            assert_eq!(order.payment.goods_total, sum);
            assert_eq!(order.payment.amount, sum + order.payment.delivery_cost);
            assert!((1..=4).contains(&order.items.len()));
            assert!(order.items.iter().all(|i| i.track_number == order.track_number));
        }
    }

    #[tokio::test]
    async fn test_shutdown_during_publish_stops_the_loop() {
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let mut stop = Some(stop);
        let mut uids = Vec::new();

        let published = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            publish_until(
                std::time::Duration::from_millis(1),
                async {
                    let _ = stopped.await;
                },
                |order| {
                    // Signal arrives while this order is in flight.
                    if let Some(stop) = stop.take() {
                        let _ = stop.send(());
                    }
                    uids.push(order.order_uid);
                    async {}
                },
            ),
        )
        .await
        .expect("shutdown signal was lost");

        assert_eq!(published, 1);
        assert_eq!(uids.len(), 1);
    }

    #[test]
    fn test_orders_have_distinct_uids() {
        assert_ne!(new_order().order_uid, new_order().order_uid);
    }
}
