use samadhaan_dispute_model::{Dispute, Offer};

/// Formats rupee amounts the way they appear in notices: grouped
/// thousands, two decimals.
pub fn format_inr(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let rupees = (cents / 100).to_string();
    let paise = cents % 100;

    let mut grouped = String::with_capacity(rupees.len() + rupees.len() / 3);
    for (idx, digit) in rupees.chars().enumerate() {
        if idx > 0 && (rupees.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!(
        "{}{}.{:02}",
        if negative { "-" } else { "" },
        grouped,
        paise
    )
}

/// MSMED Act provisions a suggestion leans on, for the audit trail.
pub fn cited_rules(days_delayed: u32, interest_amount: f64) -> Vec<String> {
    let mut rules = vec![];
    if days_delayed > 45 {
        rules.push("MSMED Act Section 15 (payment within 45 days)".to_string());
    }
    if interest_amount > 0.0 {
        rules.push("MSMED Act Section 16 (interest on delayed payment)".to_string());
    }
    rules
}

/// Plain-language explanation of an opening offer, addressed to the
/// MSME owner.
pub fn initial_offer(
    dispute: &Dispute,
    suggested_amount: f64,
    interest_amount: f64,
    required_documents: &[String],
) -> String {
    let dispute_amount = match dispute.dispute_amount {
        Some(amount) if amount > 0.0 => amount,
        _ => return "Unable to generate reasoning without dispute amount".to_string(),
    };
    let percentage = suggested_amount / dispute_amount * 100.0;
    let days_delayed = dispute.days_delayed.unwrap_or(0);

    let mut parts = vec![format!(
        "I recommend starting with a settlement offer of ₹{} ({:.1}% of the original amount).",
        format_inr(suggested_amount),
        percentage
    )];

    if interest_amount > 0.0 {
        parts.push(format!(
            "Under Section 16 of the MSMED Act, interest of ₹{} has accrued due to the {} days of payment delay.",
            format_inr(interest_amount),
            days_delayed
        ));
    }

    if days_delayed > 90 {
        parts.push(
            "The extended payment delay strengthens your case for a higher settlement."
                .to_string(),
        );
    } else if days_delayed > 45 {
        parts.push(
            "The payment delay exceeds the MSMED Act threshold, supporting your claim."
                .to_string(),
        );
    }

    if dispute.has_all_mandatory_documents(required_documents) {
        parts.push(
            "Your documentation is complete, which strengthens your negotiating position."
                .to_string(),
        );
    }

    parts.push(
        "This starting point allows room for negotiation while maintaining a strong position. \
         The buyer may counter, but we can work toward a fair settlement."
            .to_string(),
    );

    parts.join(" ")
}

/// Explanation of a counteroffer against the offer currently on the
/// table.
pub fn counter_offer(
    dispute: &Dispute,
    current_offer: &Offer,
    counter_amount: f64,
    history_len: usize,
) -> String {
    let dispute_amount = match dispute.dispute_amount {
        Some(amount) if amount > 0.0 => amount,
        _ => return "Unable to generate reasoning without dispute amount".to_string(),
    };
    let counter_percentage = counter_amount / dispute_amount * 100.0;
    let current_percentage = current_offer.offered_amount / dispute_amount * 100.0;

    let current_position = if current_percentage < 70.0 {
        "is below a fair settlement range"
    } else if current_percentage < 85.0 {
        "is in the negotiable range"
    } else {
        "is approaching a fair settlement"
    };

    let mut parts = vec![
        format!(
            "The current offer of ₹{} ({:.1}%) {}.",
            format_inr(current_offer.offered_amount),
            current_percentage,
            current_position
        ),
        format!(
            "I recommend countering with ₹{} ({:.1}%).",
            format_inr(counter_amount),
            counter_percentage
        ),
    ];

    if history_len >= 3 {
        parts.push(
            "The negotiation is progressing. This counteroffer moves toward a mutually acceptable settlement."
                .to_string(),
        );
    } else {
        parts.push(
            "This counteroffer balances your interests while showing willingness to negotiate."
                .to_string(),
        );
    }

    let gap_percentage = (counter_amount - current_offer.offered_amount).abs() / dispute_amount * 100.0;
    if gap_percentage < 10.0 {
        parts.push(format!(
            "The remaining gap is only {:.1}% - settlement is within reach.",
            gap_percentage
        ));
    }

    parts.join(" ")
}
