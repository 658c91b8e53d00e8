use rand::Rng;
use skyfare_core::error::BookingError;
use skyfare_core::repository::TicketRepository;
use skyfare_core::ticket::Pnr;

const PNR_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn random_pnr() -> Pnr {
    let mut rng = rand::thread_rng();
    let code: String = (0..Pnr::LEN)
        .map(|_| PNR_CHARSET[rng.gen_range(0..PNR_CHARSET.len())] as char)
        .collect();
    Pnr::parse(&code).expect("generated PNR is always valid")
}

/// Draw a booking reference not yet present in the ticket store. The
/// 36^6 code space makes collisions negligible; the bounded retry exists so
/// a pathological store state errors out instead of spinning.
pub async fn allocate_pnr(
    tickets: &dyn TicketRepository,
    max_attempts: u32,
) -> Result<Pnr, BookingError> {
    for _ in 0..max_attempts.max(1) {
        let candidate = random_pnr();
        if tickets.find_by_pnr(&candidate).await?.is_none() {
            return Ok(candidate);
        }
    }
    Err(BookingError::Internal(
        "could not allocate a unique PNR".to_string(),
    ))
}
