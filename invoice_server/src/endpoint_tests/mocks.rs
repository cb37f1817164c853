use invoice_engine::{
    db_types::InvoiceId,
    traits::{
        GatewayPoll,
        GatewayStatus,
        MessageId,
        NotificationChannel,
        NotificationError,
        Notifier,
        PriceError,
        PriceSource,
        UpstreamError,
    },
    ResolvedView,
};
use mockall::mock;
use rust_decimal::Decimal;

mock! {
    pub Gateway {}
    impl GatewayPoll for Gateway {
        async fn authoritative_status(&self, invoice_id: &InvoiceId) -> Result<GatewayStatus, UpstreamError>;
    }
}

mock! {
    pub Mailer {}
    impl Notifier for Mailer {
        async fn send(&self, channel: &NotificationChannel, invoice: &ResolvedView) -> Result<MessageId, NotificationError>;
    }
}

mock! {
    pub PriceFeed {}
    impl PriceSource for PriceFeed {
        fn name(&self) -> String;
        async fn fetch_spot_price(&self) -> Result<Decimal, PriceError>;
    }
}
