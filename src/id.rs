use {
    rocket::request::FromParam,
    uuid::Uuid,
    crate::prelude::*,
};

macro_rules! uuid_id {
    ($($(#[$attr:meta])* $name:ident,)*) => {
        $(
            $(#[$attr])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, sqlx::Type, derive_more::Display, derive_more::From, derive_more::FromStr)]
            #[serde(transparent)]
            #[sqlx(transparent)]
            pub(crate) struct $name(pub(crate) Uuid);

            impl $name {
                #[cfg(test)]
                pub(crate) fn new() -> Self {
                    Self(Uuid::new_v4())
                }
            }

            impl<'a> FromParam<'a> for $name {
                type Error = uuid::Error;

                fn from_param(param: &'a str) -> Result<Self, Self::Error> {
                    param.parse().map(Self)
                }
            }
        )*
    };
}

uuid_id! {
    /// Primary key of the `tournaments` table.
    TournamentId,
    /// A user's profile ID, shared by `profiles.id` and `predictions.user_id`.
    UserId,
    PredictionId,
}
