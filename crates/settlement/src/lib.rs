mod campaign;
mod coupon;
mod earnings;
mod enrollment;
mod fees;
mod fiscal;
mod instructor;
mod money;
mod notification;
mod payout;
mod refund;
mod sale;
mod split;
mod wallet;

pub mod store;

pub use campaign::{
    resolve_checkout_price, Campaign, CampaignSegment, CampaignType, DiscountValue,
};
pub use coupon::Coupon;
pub use earnings::{EarningsStatus, InstructorEarnings};
pub use enrollment::Enrollment;
pub use fees::{
    card_processing_fee, payment_fee, PaymentFee, PaymentMethod, CARD_FEE_FIXED, CARD_FEE_RATE,
    CARD_FEE_VAT_GROSS_UP,
};
pub use fiscal::{
    calculate_isr, calculate_vat, country_config, CountryConfig, FiscalRegime, IsrRule, IsrTier,
    IsrWithholding, VatBreakdown, INTL,
};
pub use instructor::{InstructorFiscalProfile, InstructorPaymentConfig};
pub use money::round2;
pub use notification::{NotificationSink, NotificationType, UserNotification};
pub use payout::{
    calculate_instructor_payout, convert, validate_tax_limits, ExchangeRates, PayoutBreakdown,
    PayoutParams, TaxAlert, TaxAlertLevel, TaxLimitCheck,
};
pub use refund::{
    Refund, RefundError, RefundRejection, RefundRequestOutcome, RefundReviewOutcome,
    RefundService, RefundStatus, RejectionReason, ReviewDecision, MAX_REFUNDS_PER_PRODUCT,
    REFUND_DAYS_LIMIT,
};
pub use sale::{ProductKind, ProductRef, Sale, SaleItem, SaleStatus};
pub use split::{
    audit_earning, recalculate_split, resolve_commission_rate, SplitAudit, SplitBreakdown,
    EARNING_TOLERANCE, PLATFORM_COMMISSION_RATE, RATE_TOLERANCE, REFERRAL_COMMISSION_RATE,
};
pub use wallet::{Wallet, WalletTransaction, WalletTransactionType};
