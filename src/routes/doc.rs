use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest, VerifyRequest},
        cart::{AddToCartRequest, CartList, MigrateCartResponse, UpdateCartItemRequest},
        coupons::{
            CouponList, CouponPreview, CreateCouponRequest, UpdateCouponRequest,
            ValidateCouponRequest,
        },
        orders::{CheckoutRequest, OrderList, OrderWithItems},
    },
    models::{
        CartItem, Category, Coupon, OptionChoice, OptionField, OptionSchema, Order, OrderItem,
        OrderStatus, Product, Review, User, WishlistItem,
    },
    pricing::DiscountType,
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, categories, coupons, health, orders, params, products, reviews,
        wishlist,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::verify,
        auth::login,
        auth::change_password_route,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        cart::migrate_cart,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        coupons::validate_coupon,
        coupons::list_coupons,
        coupons::create_coupon,
        coupons::get_coupon,
        coupons::update_coupon,
        coupons::delete_coupon,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::cancel_order,
        reviews::list_product_reviews,
        reviews::create_review,
        reviews::delete_review,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            OptionSchema,
            OptionChoice,
            OptionField,
            CartItem,
            WishlistItem,
            Coupon,
            DiscountType,
            Order,
            OrderItem,
            OrderStatus,
            Review,
            Meta,
            RegisterRequest,
            VerifyRequest,
            LoginRequest,
            LoginResponse,
            ChangePasswordRequest,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartList,
            MigrateCartResponse,
            CreateCouponRequest,
            UpdateCouponRequest,
            ValidateCouponRequest,
            CouponPreview,
            CouponList,
            CheckoutRequest,
            OrderWithItems,
            OrderList,
            categories::CreateCategoryRequest,
            categories::UpdateCategoryRequest,
            categories::CategoryList,
            products::CreateProductRequest,
            products::UpdateProductRequest,
            products::ProductList,
            wishlist::AddWishlistRequest,
            wishlist::WishlistProductList,
            reviews::CreateReviewRequest,
            reviews::ReviewList,
            admin::UpdateOrderStatusRequest,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            ApiResponse<Product>,
            ApiResponse<CartList>,
            ApiResponse<CouponPreview>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Catalog", description = "Category and product endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Wishlist", description = "Wishlist endpoints"),
        (name = "Coupons", description = "Coupon endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Reviews", description = "Review endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
