use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::{debug, trace};
use rust_decimal::Decimal;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{InvoiceId, InvoiceRecord, InvoiceStatus, InvoiceUpdate, NewInvoice, WalletAddress},
    traits::LedgerError,
};

/// A raw row from the `invoices` table. Decimals come back as text and are parsed in the conversion to
/// [`InvoiceRecord`].
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub invoice_id: String,
    pub status: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub wallet_address: Option<String>,
    pub wallet_network: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub token_price: Option<String>,
    pub tokens_purchased: Option<String>,
    pub email_sent_user: bool,
    pub email_sent_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub escalated_at: Option<DateTime<Utc>>,
}

impl TryFrom<InvoiceRow> for InvoiceRecord {
    type Error = LedgerError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let key = row.invoice_id.clone();
        let corrupt = |e: String| LedgerError::CorruptRecord(key.clone(), e);
        let decimal = |v: Option<String>| -> Result<Option<Decimal>, LedgerError> {
            v.filter(|s| !s.is_empty())
                .map(|s| Decimal::from_str(&s).map_err(|e| corrupt(format!("'{s}' is not a decimal. {e}"))))
                .transpose()
        };
        let wallet = match (row.wallet_address.as_deref(), row.wallet_network.as_deref()) {
            (Some(a), Some(n)) if !a.is_empty() => {
                Some(WalletAddress::from_parts(a, n).map_err(|e| corrupt(e.to_string()))?)
            },
            _ => None,
        };
        Ok(InvoiceRecord {
            invoice_id: InvoiceId::from_str(&row.invoice_id).map_err(|e| corrupt(e.to_string()))?,
            status: InvoiceStatus::from_str(&row.status).map_err(|e| corrupt(e.to_string()))?,
            email: row.email,
            name: row.name,
            wallet,
            amount: decimal(row.amount)?,
            currency: row.currency,
            token_price: decimal(row.token_price)?,
            tokens_purchased: decimal(row.tokens_purchased)?,
            email_sent_user: row.email_sent_user,
            email_sent_admin: row.email_sent_admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
            email_sent_at: row.email_sent_at,
            escalated_at: row.escalated_at,
        })
    }
}

/// Inserts the invoice, returning `false` in the second parameter if an invoice with the same key already exists. The
/// existing row is returned untouched in that case.
///
/// The conflict check and the insert are a single statement, so two concurrent inserts cannot both succeed.
pub async fn idempotent_insert(
    invoice: NewInvoice,
    conn: &mut SqliteConnection,
) -> Result<(InvoiceRecord, bool), LedgerError> {
    let invoice_id = invoice.invoice_id.clone();
    let (address, network) = match &invoice.wallet {
        Some(w) => (Some(w.address().to_string()), Some(w.network().to_string())),
        None => (None, None),
    };
    let row: Option<InvoiceRow> = sqlx::query_as(
        r#"
            INSERT INTO invoices (
                invoice_id,
                status,
                email,
                name,
                wallet_address,
                wallet_network,
                amount,
                currency,
                created_at,
                updated_at
            ) VALUES ($1, 'CREATED', $2, $3, $4, $5, $6, $7, $8, $8)
            ON CONFLICT (invoice_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(invoice.invoice_id.as_str())
    .bind(invoice.email)
    .bind(invoice.name)
    .bind(address)
    .bind(network)
    .bind(invoice.amount.map(|a| a.to_string()))
    .bind(invoice.currency)
    .bind(invoice.created_at)
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(row) => {
            debug!("🗃️ Invoice [{invoice_id}] inserted");
            Ok((row.try_into()?, true))
        },
        None => {
            let existing = fetch_invoice(&invoice_id, conn)
                .await?
                .ok_or_else(|| LedgerError::DatabaseError(format!("Invoice {invoice_id} conflicted but was not found")))?;
            Ok((existing, false))
        },
    }
}

pub async fn fetch_invoice(
    invoice_id: &InvoiceId,
    conn: &mut SqliteConnection,
) -> Result<Option<InvoiceRecord>, LedgerError> {
    let row: Option<InvoiceRow> = sqlx::query_as("SELECT * FROM invoices WHERE invoice_id = $1")
        .bind(invoice_id.as_str())
        .fetch_optional(conn)
        .await?;
    row.map(InvoiceRecord::try_from).transpose()
}

/// Applies a guarded update in a single `UPDATE … RETURNING` statement. The rules are the same as
/// [`InvoiceUpdate::apply_to`]:
/// * the status only changes while the stored status is open,
/// * notification flags only change from false to true,
/// * token fields and `email_sent_at` are only written if they are empty,
/// * email, name and wallet only fill empty fields.
///
/// Returns `None` if the invoice does not exist or a guard rejected the update.
pub async fn update_invoice(
    invoice_id: &InvoiceId,
    update: InvoiceUpdate,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<InvoiceRecord>, LedgerError> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE invoices SET updated_at = ");
    builder.push_bind(now);
    if let Some(status) = update.status {
        builder.push(", status = ");
        builder.push_bind(status.to_string());
    }
    if let Some(price) = update.token_price {
        builder.push(", token_price = COALESCE(NULLIF(token_price, ''), ");
        builder.push_bind(price.to_string());
        builder.push(")");
    }
    if let Some(tokens) = update.tokens_purchased {
        builder.push(", tokens_purchased = COALESCE(NULLIF(tokens_purchased, ''), ");
        builder.push_bind(tokens.to_string());
        builder.push(")");
    }
    if let Some(email) = update.email {
        builder.push(", email = COALESCE(NULLIF(TRIM(email), ''), ");
        builder.push_bind(email);
        builder.push(")");
    }
    if let Some(name) = update.name {
        builder.push(", name = COALESCE(NULLIF(TRIM(name), ''), ");
        builder.push_bind(name);
        builder.push(")");
    }
    if let Some(wallet) = update.wallet {
        // Every right-hand side sees the row as it was before the update
        builder.push(", wallet_network = CASE WHEN COALESCE(wallet_address, '') = '' THEN ");
        builder.push_bind(wallet.network().to_string());
        builder.push(" ELSE wallet_network END, wallet_address = COALESCE(NULLIF(wallet_address, ''), ");
        builder.push_bind(wallet.address().to_string());
        builder.push(")");
    }
    if update.email_sent_user {
        builder.push(", email_sent_user = 1");
    }
    if update.email_sent_admin {
        builder.push(", email_sent_admin = 1");
    }
    if let Some(at) = update.email_sent_at {
        builder.push(", email_sent_at = COALESCE(email_sent_at, ");
        builder.push_bind(at);
        builder.push(")");
    }
    if let Some(at) = update.escalated_at {
        builder.push(", escalated_at = ");
        builder.push_bind(at);
    }
    builder.push(" WHERE invoice_id = ");
    builder.push_bind(invoice_id.as_str());
    if update.status.is_some() {
        let open = InvoiceStatus::OPEN.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(", ");
        builder.push(format!(" AND status IN ({open})"));
    }
    if update.email_sent_user {
        builder.push(" AND email_sent_user = 0");
    }
    if update.email_sent_admin {
        builder.push(" AND email_sent_admin = 0");
    }
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let row: Option<InvoiceRow> = builder.build_query_as().fetch_optional(conn).await?;
    trace!("🗃️ Result of update_invoice: {row:?}");
    row.map(InvoiceRecord::try_from).transpose()
}
