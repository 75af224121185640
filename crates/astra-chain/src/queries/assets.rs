//! Non-native assets: ERC-20 token balances and NFTs, keyed by hex address.

use super::ChainQueries;
use super::de_balance;
use super::history::IndexerPagination;
use crate::query::{Page, PagedList, Query, QueryRequest, Record};
use astra_core::{Balance, Currency};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub contract_address: String,
    #[serde(default)]
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(deserialize_with = "de_balance")]
    pub balance: Balance,
}

impl TokenBalance {
    /// Currency descriptor for display and amount scaling.
    pub fn currency(&self) -> Currency {
        Currency::new(
            &self.symbol,
            &format!("erc20/{}", self.contract_address),
            self.decimals,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenListResponse {
    #[serde(default)]
    pub data: Vec<TokenBalance>,
}

impl TokenListResponse {
    /// Tokens with a positive balance.
    pub fn held(&self) -> impl Iterator<Item = &TokenBalance> {
        self.data.iter().filter(|t| t.balance > 0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftItem {
    pub contract_address: String,
    pub token_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub collection: String,
}

impl Record for NftItem {
    fn record_id(&self) -> String {
        format!("{}:{}", self.contract_address.to_lowercase(), self.token_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NftPage {
    #[serde(default)]
    pub data: Vec<NftItem>,
    #[serde(default)]
    pub pagination: IndexerPagination,
}

impl Page for NftPage {
    type Item = NftItem;

    fn items(&self) -> &[NftItem] {
        &self.data
    }

    fn total(&self) -> u64 {
        self.pagination.total_record
    }
}

impl ChainQueries {
    /// ERC-20 balances for a hex address.
    pub fn tokens(&self, hex_address: &str) -> Query<TokenListResponse> {
        let request = QueryRequest::new(&self.chain().indexer_url, "/api/v1/tokens")
            .param("address", hex_address)
            .require("address");
        self.cache().query(request)
    }

    /// Paginated NFTs owned by a hex address.
    pub fn nfts(&self, hex_address: &str, limit: u32) -> PagedList<NftPage> {
        let base = QueryRequest::new(&self.chain().nft_hub_url, "/api/v1/nfts")
            .param("address", hex_address)
            .require("address");
        PagedList::new(self.cache().clone(), base, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryCache;
    use crate::registry::ChainRegistry;
    use crate::testing::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_token_list() {
        let resp: TokenListResponse = serde_json::from_value(json!({"data": [
            {"contractAddress": "0xA", "name": "Tether", "symbol": "USDT", "decimals": 6, "balance": "1500000"},
            {"contractAddress": "0xB", "symbol": "DUST", "decimals": 18, "balance": "0"}
        ]}))
        .unwrap();
        let held: Vec<_> = resp.held().collect();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].currency().amount(held[0].balance).to_string(), "1.5 USDT");
    }

    #[tokio::test]
    async fn test_nft_pages_merge() {
        let transport = Arc::new(MockTransport::new());
        let chain = ChainRegistry::default().get("astra_11110-1").unwrap().clone();
        let queries = ChainQueries::new(QueryCache::new(transport.clone()), chain.clone());
        let page_url = |page: u32| {
            QueryRequest::new(&chain.nft_hub_url, "/api/v1/nfts")
                .param("address", "0xme")
                .param("page", page)
                .param("limit", 1)
                .url()
        };
        let nft = |id: &str| json!({"contractAddress": "0xC", "tokenId": id, "name": id});
        transport.respond(
            &page_url(1),
            json!({"data": [nft("1")], "pagination": {"totalRecord": 2}}),
        );
        transport.respond(
            &page_url(2),
            json!({"data": [nft("2")], "pagination": {"totalRecord": 2}}),
        );

        let list = queries.nfts("0xme", 1);
        list.load_more().await.unwrap();
        list.load_more().await.unwrap();
        let ids: Vec<String> = list.items().iter().map(Record::record_id).collect();
        assert_eq!(ids, vec!["0xc:1", "0xc:2"]);
        assert!(!list.has_more());
    }
}
